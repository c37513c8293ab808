//! Errors raised by command bodies
//!
//! A [`Fault`] is a shared handle to one raised error. Every clone refers to the
//! same error, and "the same exception" means the same handle: two faults with
//! identical messages are still different faults.

use std::fmt;
use std::sync::Arc;

/// Shared, identity-comparable handle to an error raised by a command body.
#[derive(Clone)]
pub struct Fault {
    error: Arc<anyhow::Error>,
}

impl Fault {
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self {
            error: Arc::new(error.into()),
        }
    }

    /// Fault carrying a plain message.
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self::new(anyhow::Error::msg(message))
    }

    /// The wrapped error.
    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }

    /// Whether both handles refer to the same raised error.
    pub fn same(
        &self,
        other: &Fault,
    ) -> bool {
        Arc::ptr_eq(&self.error, &other.error)
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error.downcast_ref::<E>()
    }
}

impl fmt::Debug for Fault {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_tuple("Fault")
            .field(&Arc::as_ptr(&self.error))
            .field(&format_args!("{:#}", self.error))
            .finish()
    }
}

impl fmt::Display for Fault {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        fmt::Display::fmt(&*self.error, f)
    }
}

impl From<anyhow::Error> for Fault {
    fn from(error: anyhow::Error) -> Self {
        Self::new(error)
    }
}

impl From<crate::vm::errors::ExecutionError> for Fault {
    fn from(error: crate::vm::errors::ExecutionError) -> Self {
        Self::new(error)
    }
}

impl From<crate::runtime::context::ScopeError> for Fault {
    fn from(error: crate::runtime::context::ScopeError) -> Self {
        Self::new(error)
    }
}

impl From<crate::runtime::path::PathError> for Fault {
    fn from(error: crate::runtime::path::PathError) -> Self {
        Self::new(error)
    }
}
