//! Scoped components
//!
//! A component is a value created lazily the first time its qualified name is
//! looked up in a scope context of the matching scope. Its [`ComponentDescriptor`]
//! records how to construct it, which selectors feed its fields and setters, and
//! which hooks run when it begins and ends.

pub mod descriptor;
pub mod lifecycle;
pub mod registry;

pub use descriptor::{ComponentDescriptor, DescriptorBuilder, Injection, InjectionPoint, InjectionTarget};
pub use lifecycle::{HookPhase, LifecycleError};
pub use registry::{ComponentRegistry, RegistryError};

#[cfg(test)]
mod tests;
