//! Catena command-chain runtime
//!
//! Bookkeeping for an interpreter that runs trees of commands: an invocation
//! stack machine with filter suspension, scoped variable and component
//! resolution, component lifecycle management and exception causality
//! tracking.
//!
//! # Example
//!
//! ```rust
//! use catena::runtime::ComponentRegistry;
//! use catena::vm::{invoke, BasicCommand};
//!
//! let unit = BasicCommand::new("hello").shared();
//! catena::run(ComponentRegistry::new(), "world", |exec, global| {
//!     invoke(exec, &unit, global, |_, ctx| {
//!         ctx.declare_variable("greeting", "hi")?;
//!         Ok(())
//!     })
//! })
//! .unwrap();
//! ```

#![doc(html_root_url = "https://docs.rs/catena")]
#![warn(rust_2018_idioms)]

pub mod runtime;
pub mod util;
pub mod vm;

// Re-exports
pub use runtime::{ComponentDescriptor, ComponentRegistry, QName, Scope, ScopeContext, ScopeError, Value};
pub use vm::{ExecResult, Execution, ExecutionError, Fault};

use crate::runtime::path::SimplePath;
use tracing::debug;

/// Runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runtime name
pub const NAME: &str = "Catena";

/// Run `body` as one execution over `subject` with a [`SimplePath`] evaluator.
///
/// `body` receives the machine and the global context. An error it returns
/// after recording it through the machine ends the run with
/// [`ExecutionError::Failed`].
pub fn run<F>(
    registry: ComponentRegistry,
    subject: impl Into<Value>,
    body: F,
) -> ExecResult<()>
where
    F: FnOnce(&mut Execution, &ScopeContext) -> Result<(), Fault>,
{
    debug!("{} {} run starting", NAME, VERSION);
    let mut exec = Execution::new(registry.freeze());
    exec.execute(SimplePath::shared(subject), body)
        .inspect_err(|err| debug!("run failed: {}", err))
}
