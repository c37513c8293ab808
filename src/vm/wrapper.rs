//! Command wrappers
//!
//! The calling sequence every command invocation has to follow, packaged as
//! functions: start, body, record a raised error, end. The end call runs on every
//! path.

use crate::runtime::context::ScopeContext;
use crate::vm::command::CommandRef;
use crate::vm::executor::Execution;
use crate::vm::fault::Fault;
use tracing::error;

/// What a filter's post-processing did with the error it was handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Let the pending error (if any) continue unwinding.
    Propagate,
    /// The pending error is dealt with; stop it here.
    Handled,
}

/// Run `command`'s body inside its frame.
///
/// Errors from the body are recorded with
/// [`Execution::exception_thrown`] and returned. When the body succeeds, a
/// failure to end the frame is returned instead.
pub fn invoke<F>(
    exec: &mut Execution,
    command: &CommandRef,
    ctx: &ScopeContext,
    body: F,
) -> Result<(), Fault>
where
    F: FnOnce(&mut Execution, &ScopeContext) -> Result<(), Fault>,
{
    let local = exec.start_command_execute(command, ctx)?;
    let outcome = body(exec, &local);
    if let Err(fault) = &outcome {
        record(exec.exception_thrown(command, fault), command);
    }
    let ended = exec.end_command_execute(command, &local);
    finish(outcome, ended.map(drop))
}

/// Run a suspended filter's post-processing.
///
/// `pending` is the error the filter's downstream raised, if any. Returning
/// [`Disposition::Handled`] marks it handled and swallows it.
pub fn post_process<F>(
    exec: &mut Execution,
    command: &CommandRef,
    ctx: &ScopeContext,
    pending: Option<&Fault>,
    body: F,
) -> Result<(), Fault>
where
    F: FnOnce(&mut Execution, &ScopeContext, Option<&Fault>) -> Result<Disposition, Fault>,
{
    let local = exec.start_command_post_process(command, ctx)?;
    let outcome = match body(exec, &local, pending) {
        Ok(Disposition::Handled) => {
            if let Some(fault) = pending {
                record(exec.exception_handled(command, fault), command);
            }
            Ok(())
        }
        Ok(Disposition::Propagate) => pending.cloned().map_or(Ok(()), Err),
        Err(fault) => {
            record(exec.exception_thrown(command, &fault), command);
            Err(fault)
        }
    };
    let ended = exec.end_command_post_process(command, &local);
    finish(outcome, ended.map(drop))
}

fn record(
    result: crate::vm::errors::ExecResult<()>,
    command: &CommandRef,
) {
    if let Err(err) = result {
        error!("could not record exception for '{}': {}", command.name(), err);
    }
}

fn finish(
    outcome: Result<(), Fault>,
    ended: crate::vm::errors::ExecResult<()>,
) -> Result<(), Fault> {
    match (outcome, ended) {
        (Err(fault), Err(err)) => {
            error!("ending frame after failure also failed: {}", err);
            Err(fault)
        }
        (Err(fault), Ok(())) => Err(fault),
        (Ok(()), ended) => ended.map_err(Fault::from),
    }
}
