//! Runtime system
//!
//! Scopes, qualified names, values and the scoped variable/component resolver
//! that command bodies query while the stack machine in [`crate::vm`] runs.

pub mod component;
pub mod context;
pub mod extfunc;
pub mod namespace;
pub mod path;
pub mod qname;
pub mod scope;
pub mod value;

pub use component::{ComponentDescriptor, ComponentRegistry, Injection};
pub use context::{ScopeContext, ScopeError, ScopeResult, VariableName};
pub use path::{PathContext, PathEnv, PathError, SimplePath};
pub use qname::{QName, QNameError};
pub use scope::Scope;
pub use value::{ComponentRef, Value};

#[cfg(test)]
mod tests;
