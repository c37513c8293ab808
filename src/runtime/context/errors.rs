//! Resolver errors

use crate::runtime::component::LifecycleError;
use crate::runtime::path::PathError;
use crate::runtime::qname::{QName, QNameError};
use crate::runtime::scope::Scope;
use thiserror::Error;

/// Resolver result
pub type ScopeResult<T> = Result<T, ScopeError>;

/// Scoped variable and component resolution errors
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("unable to access scope {0}")]
    Unreachable(Scope),

    #[error("unable to access component {name} for scope {scope}")]
    ComponentOutOfReach { name: QName, scope: Scope },

    #[error("unable to declare the variable {0} as it conflicts with a registered component")]
    ShadowsComponent(QName),

    #[error("the {0} scope context has been released")]
    Released(Scope),

    #[error("component {0} depends on itself")]
    CircularComponent(QName),

    #[error(transparent)]
    QName(#[from] QNameError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
