//! Stack machine errors

use crate::runtime::context::ScopeError;
use crate::vm::fault::Fault;
use crate::vm::frames::{ExceptionContext, TraceElement};
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Stack machine result
pub type ExecResult<T> = Result<T, ExecutionError>;

/// The machine's stacks, named for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackKind {
    Frames,
    SuspendedFrames,
    Trace,
    SuspendedTrace,
    Contexts,
    SuspendedContexts,
    Prefixes,
}

impl fmt::Display for StackKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            StackKind::Frames => "frame",
            StackKind::SuspendedFrames => "suspended frame",
            StackKind::Trace => "trace",
            StackKind::SuspendedTrace => "suspended trace",
            StackKind::Contexts => "context",
            StackKind::SuspendedContexts => "suspended context",
            StackKind::Prefixes => "prefix mapping",
        };
        f.write_str(name)
    }
}

/// Stack machine errors
///
/// Everything except [`ExecutionError::Failed`] and [`ExecutionError::Escaped`]
/// reports a defect in the calling code: calls out of order, on the wrong
/// context, or for the wrong command.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("an execution is already in progress")]
    AlreadyRunning,

    #[error("no execution is in progress")]
    NotRunning,

    #[error("initial call to command '{command}' that is not registered with a catalog")]
    UnregisteredEntry { command: String },

    #[error("the context passed to {operation} was not the current context")]
    ContextMismatch { operation: &'static str },

    #[error("the command passed to {operation} was '{found}', but the current command is '{expected}'")]
    CommandMismatch {
        operation: &'static str,
        expected: String,
        found: String,
    },

    #[error("the context passed to {operation} is not a context pointer")]
    NotAPointer { operation: &'static str },

    #[error("the {0} stack is empty")]
    EmptyStack(StackKind),

    #[error("call depth exceeded the limit of {0} frames")]
    CallDepthExceeded(usize),

    #[error("prefix mappings undefined on the wrong context and command '{command}'")]
    PrefixMismatch { command: String },

    #[error("command '{command}' reported a handled exception, but none was recorded")]
    MissingException { command: String },

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error(transparent)]
    Failed(Box<ExecutionFailure>),

    #[error("an error escaped the execution without being recorded: {0}")]
    Escaped(Fault),
}

/// Error raised by `end_execution` when the run ended with an unhandled error.
///
/// Carries the trace captured when the error was first recorded and every
/// earlier error it interrupted.
#[derive(Debug, Clone)]
pub struct ExecutionFailure {
    fault: Fault,
    trace: Vec<TraceElement>,
    causes: Vec<(Fault, Vec<TraceElement>)>,
}

impl ExecutionFailure {
    pub(crate) fn from_context(context: &ExceptionContext) -> Self {
        Self {
            fault: context.fault().clone(),
            trace: context.trace().to_vec(),
            causes: context
                .chain()
                .skip(1)
                .map(|cause| (cause.fault().clone(), cause.trace().to_vec()))
                .collect(),
        }
    }

    /// The error that ended the run.
    pub fn fault(&self) -> &Fault {
        &self.fault
    }

    /// Trace at the point the error was recorded, innermost first.
    pub fn trace(&self) -> &[TraceElement] {
        &self.trace
    }

    /// Earlier errors this one interrupted, most recent first.
    pub fn causes(&self) -> &[(Fault, Vec<TraceElement>)] {
        &self.causes
    }
}

fn write_trace(
    f: &mut fmt::Formatter<'_>,
    trace: &[TraceElement],
) -> fmt::Result {
    for element in trace {
        write!(f, "\n        at {}", element)?;
    }
    Ok(())
}

impl fmt::Display for ExecutionFailure {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "an exception was thrown during the execution: {}", self.fault)?;
        write_trace(f, &self.trace)?;
        for (fault, trace) in &self.causes {
            write!(f, "\n    while handling: {}", fault)?;
            write_trace(f, trace)?;
        }
        Ok(())
    }
}

impl StdError for ExecutionFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        let source: &(dyn StdError + Send + Sync + 'static) = self.fault.error().as_ref();
        Some(source)
    }
}
