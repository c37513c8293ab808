//! Invocation stack machine
//!
//! This module drives command frames, scope contexts, trace entries and
//! exception causality for one run.

pub use command::{BasicCommand, Command, CommandKind, CommandRef, Registration};
pub use errors::{ExecResult, ExecutionError, ExecutionFailure, StackKind};
pub use executor::Execution;
pub use fault::Fault;
pub use frames::{ExceptionContext, FrameKind, InvocationFrame, Locator, TraceElement, TraceEntry};
pub use prefix::PrefixOverrideStack;
pub use wrapper::{invoke, post_process, Disposition};

mod command;
mod errors;
mod executor;
mod fault;
mod frames;
mod prefix;
mod wrapper;

#[cfg(test)]
mod tests;
