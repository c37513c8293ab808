//! Registration table for component descriptors, functions and default namespaces.
//!
//! The table is filled once at startup and frozen into an `Rc`; scope contexts
//! only ever read it.

use super::descriptor::ComponentDescriptor;
use crate::runtime::extfunc::{ExternalFunction, FunctionLibrary, NativeFn, BUILTIN_FUNCTIONS, ENGINE_NAMESPACE, ENGINE_PREFIX};
use crate::runtime::qname::QName;
use crate::runtime::scope::Scope;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

/// Registration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("component {0} is already registered")]
    DuplicateComponent(QName),
}

/// Descriptor, function and namespace lookups used by scope contexts.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    components: HashMap<QName, ComponentDescriptor>,
    functions: FunctionLibrary,
    prefixes: IndexMap<String, String>,
}

impl ComponentRegistry {
    /// Registry with the built-in functions and the engine prefix bound.
    pub fn new() -> Self {
        let mut prefixes = IndexMap::new();
        prefixes.insert(ENGINE_PREFIX.to_string(), ENGINE_NAMESPACE.to_string());
        Self {
            components: HashMap::new(),
            functions: BUILTIN_FUNCTIONS.clone(),
            prefixes,
        }
    }

    /// Registry with nothing in it.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        descriptor: ComponentDescriptor,
    ) -> Result<(), RegistryError> {
        let name = descriptor.name().clone();
        if self.components.contains_key(&name) {
            return Err(RegistryError::DuplicateComponent(name));
        }
        self.components.insert(name, descriptor);
        Ok(())
    }

    /// Default binding for `prefix` in every root namespace layer.
    pub fn bind_prefix(
        &mut self,
        prefix: &str,
        uri: &str,
    ) {
        self.prefixes.insert(prefix.to_string(), uri.to_string());
    }

    pub fn register_function(
        &mut self,
        name: QName,
        func: NativeFn,
    ) {
        self.functions.register(ExternalFunction { name, func });
    }

    pub fn descriptor(
        &self,
        name: &QName,
    ) -> Option<&ComponentDescriptor> {
        self.components.get(name)
    }

    /// Descriptor for `name` if it is owned by `scope`.
    pub fn descriptor_in(
        &self,
        name: &QName,
        scope: Scope,
    ) -> Option<&ComponentDescriptor> {
        self.descriptor(name).filter(|d| d.scope() == scope)
    }

    pub fn function(
        &self,
        name: &QName,
    ) -> Option<&ExternalFunction> {
        self.functions.get(name)
    }

    pub fn default_prefixes(&self) -> &IndexMap<String, String> {
        &self.prefixes
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Freeze for sharing with scope contexts.
    pub fn freeze(self) -> Rc<Self> {
        Rc::new(self)
    }
}
