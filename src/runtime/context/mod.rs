//! Scoped variable and component resolver
//!
//! A [`ScopeContext`] is one node in a parent-linked chain. Each node owns a
//! variable table holding declared variables and lazily created components for
//! its scope; lookups either stay on the node or are delegated up the chain,
//! depending on the scope a component descriptor or the caller names.
//!
//! Context-pointer views ([`ScopeContext::relative`]) share their origin's table
//! and namespace layer and only swap the subject.

mod errors;

pub use errors::{ScopeError, ScopeResult};

use crate::runtime::component::{lifecycle, ComponentRegistry};
use crate::runtime::namespace::Namespaces;
use crate::runtime::path::{PathContext, PathEnv, PathError};
use crate::runtime::qname::QName;
use crate::runtime::scope::Scope;
use crate::runtime::value::{ComponentRef, Value};
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, error, warn};

/// Anything that names a variable: a [`QName`] or its textual form.
pub trait VariableName {
    fn to_qname(
        &self,
        ctx: &ScopeContext,
    ) -> ScopeResult<QName>;
}

impl VariableName for QName {
    fn to_qname(
        &self,
        _ctx: &ScopeContext,
    ) -> ScopeResult<QName> {
        Ok(self.clone())
    }
}

impl VariableName for str {
    fn to_qname(
        &self,
        ctx: &ScopeContext,
    ) -> ScopeResult<QName> {
        ctx.qname(self)
    }
}

impl VariableName for String {
    fn to_qname(
        &self,
        ctx: &ScopeContext,
    ) -> ScopeResult<QName> {
        ctx.qname(self)
    }
}

impl<T: VariableName + ?Sized> VariableName for &T {
    fn to_qname(
        &self,
        ctx: &ScopeContext,
    ) -> ScopeResult<QName> {
        (**self).to_qname(ctx)
    }
}

struct VariableTable {
    scope: Scope,
    registry: Rc<ComponentRegistry>,
    declared: RefCell<IndexMap<QName, Value>>,
    components: RefCell<IndexMap<QName, ComponentRef>>,
    /// Components whose construction is in progress.
    creating: RefCell<Vec<QName>>,
    released: Cell<bool>,
    warn_unreleased: Cell<bool>,
}

impl VariableTable {
    fn release_components(&self) {
        let cached = std::mem::take(&mut *self.components.borrow_mut());
        for (name, component) in cached {
            let Some(descriptor) = self.registry.descriptor(&name) else {
                continue;
            };
            for failure in lifecycle::do_end(&component, descriptor) {
                error!("error releasing component {}: {:#}", name, anyhow::Error::from(failure));
            }
        }
    }
}

impl Drop for VariableTable {
    fn drop(&mut self) {
        if self.components.get_mut().is_empty() {
            return;
        }
        if self.warn_unreleased.get() {
            warn!("components at scope {} were not properly released", self.scope);
        }
        self.release_components();
    }
}

struct Node {
    table: Rc<VariableTable>,
    path: Rc<dyn PathContext>,
    namespaces: Namespaces,
    parent: Option<ScopeContext>,
    /// Pointer views borrow their origin's table and never release it.
    owner: bool,
}

/// Handle to one scope-context node. Clones refer to the same node.
#[derive(Clone)]
pub struct ScopeContext {
    node: Rc<Node>,
}

impl ScopeContext {
    /// Outermost node, at [`Scope::Request`].
    pub fn root(
        registry: Rc<ComponentRegistry>,
        path: Rc<dyn PathContext>,
    ) -> Self {
        Self::new(Scope::Request, registry, path, None)
    }

    /// A node at `scope` below `parent`, opening a new namespace layer.
    pub fn new(
        scope: Scope,
        registry: Rc<ComponentRegistry>,
        path: Rc<dyn PathContext>,
        parent: Option<&ScopeContext>,
    ) -> Self {
        let namespaces = match parent {
            Some(parent) => parent.node.namespaces.child(),
            None => Namespaces::root(registry.default_prefixes().clone()),
        };
        debug!("created {} scope context", scope);
        Self {
            node: Rc::new(Node {
                table: Rc::new(VariableTable {
                    scope,
                    registry,
                    declared: RefCell::new(IndexMap::new()),
                    components: RefCell::new(IndexMap::new()),
                    creating: RefCell::new(Vec::new()),
                    released: Cell::new(false),
                    warn_unreleased: Cell::new(true),
                }),
                path,
                namespaces,
                parent: parent.cloned(),
                owner: true,
            }),
        }
    }

    /// Child node one boundary below this one.
    pub fn child(
        &self,
        path: Rc<dyn PathContext>,
    ) -> Self {
        self.child_in(self.scope().child(), path)
    }

    /// Child node at an explicit scope.
    pub fn child_in(
        &self,
        scope: Scope,
        path: Rc<dyn PathContext>,
    ) -> Self {
        let child = Self::new(scope, Rc::clone(&self.node.table.registry), path, Some(self));
        child
            .node
            .table
            .warn_unreleased
            .set(self.node.table.warn_unreleased.get());
        child
    }

    /// View of this node with a different subject.
    pub fn relative(
        &self,
        subject: Value,
    ) -> ScopeResult<Self> {
        let path = self.node.path.relative(subject)?;
        Ok(Self {
            node: Rc::new(Node {
                table: Rc::clone(&self.node.table),
                path,
                namespaces: self.node.namespaces.clone(),
                parent: self.node.parent.clone(),
                owner: false,
            }),
        })
    }

    pub fn scope(&self) -> Scope {
        self.node.table.scope
    }

    pub fn parent(&self) -> Option<&ScopeContext> {
        self.node.parent.as_ref()
    }

    pub fn registry(&self) -> &Rc<ComponentRegistry> {
        &self.node.table.registry
    }

    pub fn path(&self) -> &Rc<dyn PathContext> {
        &self.node.path
    }

    /// Subject selectors evaluate against.
    pub fn subject(&self) -> &Value {
        self.node.path.subject()
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.node.namespaces
    }

    pub fn namespace_uri(
        &self,
        prefix: &str,
    ) -> Option<String> {
        self.node.namespaces.namespace_uri(prefix)
    }

    /// Bind `prefix` in this node's layer; `None` unbinds it.
    pub fn register_namespace(
        &self,
        prefix: &str,
        uri: Option<&str>,
    ) {
        self.node.namespaces.register_namespace(prefix, uri);
    }

    /// Parse a textual name against the visible namespace bindings.
    pub fn qname(
        &self,
        text: &str,
    ) -> ScopeResult<QName> {
        Ok(QName::parse(text, |prefix| self.namespace_uri(prefix))?)
    }

    /// Look `name` up at this node's scope.
    ///
    /// A name registered as a component is materialised at the owning scope,
    /// delegating up the chain when that is not this node's. Anything else is
    /// a plain declared variable of this node.
    pub fn get_variable(
        &self,
        name: impl VariableName,
    ) -> ScopeResult<Option<Value>> {
        let name = name.to_qname(self)?;
        self.lookup(&name)
    }

    /// Look `name` up at the node of `scope` in this node's ancestry.
    pub fn get_variable_in(
        &self,
        name: impl VariableName,
        scope: Scope,
    ) -> ScopeResult<Option<Value>> {
        let name = name.to_qname(self)?;
        self.at_scope(scope)?.lookup(&name)
    }

    pub fn declare_variable(
        &self,
        name: impl VariableName,
        value: impl Into<Value>,
    ) -> ScopeResult<()> {
        let name = name.to_qname(self)?;
        self.declare(name, value.into())
    }

    pub fn declare_variable_in(
        &self,
        name: impl VariableName,
        value: impl Into<Value>,
        scope: Scope,
    ) -> ScopeResult<()> {
        let name = name.to_qname(self)?;
        self.at_scope(scope)?.declare(name, value.into())
    }

    /// Remove a declared variable, returning its value.
    pub fn undeclare_variable(
        &self,
        name: impl VariableName,
    ) -> ScopeResult<Option<Value>> {
        let name = name.to_qname(self)?;
        self.ensure_live()?;
        Ok(self.node.table.declared.borrow_mut().shift_remove(&name))
    }

    pub fn undeclare_variable_in(
        &self,
        name: impl VariableName,
        scope: Scope,
    ) -> ScopeResult<Option<Value>> {
        let name = name.to_qname(self)?;
        self.at_scope(scope)?.undeclare_variable(name)
    }

    /// Whether `name` is declared here or names a component of this scope.
    pub fn is_declared_variable(
        &self,
        name: impl VariableName,
    ) -> ScopeResult<bool> {
        let name = name.to_qname(self)?;
        if self.registry().descriptor_in(&name, self.scope()).is_some() {
            return Ok(true);
        }
        Ok(self.node.table.declared.borrow().contains_key(&name))
    }

    pub fn is_declared_variable_in(
        &self,
        name: impl VariableName,
        scope: Scope,
    ) -> ScopeResult<bool> {
        let name = name.to_qname(self)?;
        self.at_scope(scope)?.is_declared_variable(name)
    }

    /// Cached instance of component `name`, created on first request.
    ///
    /// `Ok(None)` when no descriptor is registered under `name`.
    pub fn get_component(
        &self,
        name: &QName,
    ) -> ScopeResult<Option<ComponentRef>> {
        self.ensure_live()?;
        let table = &self.node.table;
        let cached = table.components.borrow().get(name).cloned();
        if let Some(component) = cached {
            return Ok(Some(component));
        }

        let Some(descriptor) = table.registry.descriptor(name) else {
            return Ok(None);
        };
        if table.creating.borrow().contains(name) {
            return Err(ScopeError::CircularComponent(name.clone()));
        }

        table.creating.borrow_mut().push(name.clone());
        let created = lifecycle::create_component(descriptor, self);
        table.creating.borrow_mut().retain(|n| n != name);

        let component = created.map_err(|err| {
            error!("error creating component {}: {}", name, err);
            err
        })?;
        table
            .components
            .borrow_mut()
            .insert(name.clone(), component.clone());
        Ok(Some(component))
    }

    /// Names of the components currently cached on this node's table.
    pub fn cached_components(&self) -> Vec<QName> {
        self.node.table.components.borrow().keys().cloned().collect()
    }

    /// Run every cached component's end hooks, then empty the cache.
    ///
    /// Hook failures are logged and do not stop the remaining releases.
    pub fn release_components(&self) {
        self.node.table.release_components();
    }

    /// Release this node if it owns its table. Later lookups fail.
    pub(crate) fn end(&self) {
        if !self.node.owner || self.node.table.released.get() {
            return;
        }
        self.node.table.release_components();
        self.node.table.released.set(true);
        debug!("released {} scope context", self.scope());
    }

    pub fn is_released(&self) -> bool {
        self.node.table.released.get()
    }

    /// Whether this node is a view over another node's table.
    pub fn is_pointer(&self) -> bool {
        !self.node.owner
    }

    /// Toggle the warning logged when the table is dropped holding components.
    pub fn set_warn_unreleased(
        &self,
        warn: bool,
    ) {
        self.node.table.warn_unreleased.set(warn);
    }

    /// Evaluate `selector` against this node's subject.
    pub fn evaluate(
        &self,
        selector: &str,
    ) -> Result<Value, PathError> {
        self.node.path.evaluate(selector, self)
    }

    /// Node identity.
    pub fn ptr_eq(
        &self,
        other: &ScopeContext,
    ) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    pub fn shares_variables_with(
        &self,
        other: &ScopeContext,
    ) -> bool {
        Rc::ptr_eq(&self.node.table, &other.node.table)
    }

    fn ensure_live(&self) -> ScopeResult<()> {
        if self.is_released() {
            return Err(ScopeError::Released(self.scope()));
        }
        Ok(())
    }

    fn at_scope(
        &self,
        scope: Scope,
    ) -> ScopeResult<&ScopeContext> {
        let mut current = self;
        loop {
            if current.scope() == scope {
                return Ok(current);
            }
            current = current.parent().ok_or(ScopeError::Unreachable(scope))?;
        }
    }

    fn lookup(
        &self,
        name: &QName,
    ) -> ScopeResult<Option<Value>> {
        self.ensure_live()?;
        if let Some(descriptor) = self.registry().descriptor(name) {
            let found = if descriptor.scope() == self.scope() {
                self.get_component(name)?.map(Value::Component)
            } else {
                match self.parent() {
                    Some(parent) => parent.lookup(name)?,
                    None => {
                        return Err(ScopeError::ComponentOutOfReach {
                            name: name.clone(),
                            scope: descriptor.scope(),
                        })
                    }
                }
            };
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(self.node.table.declared.borrow().get(name).cloned())
    }

    fn declare(
        &self,
        name: QName,
        value: Value,
    ) -> ScopeResult<()> {
        self.ensure_live()?;
        if self.registry().descriptor_in(&name, self.scope()).is_some() {
            return Err(ScopeError::ShadowsComponent(name));
        }
        self.node.table.declared.borrow_mut().insert(name, value);
        Ok(())
    }
}

impl PathEnv for ScopeContext {
    fn variable(
        &self,
        name: &str,
    ) -> Result<Option<Value>, PathError> {
        self.get_variable(name).map_err(|err| match err {
            ScopeError::Path(err) => err,
            other => PathError::Resolution(other.to_string()),
        })
    }

    fn call(
        &self,
        name: &str,
        args: &[Value],
    ) -> Result<Value, PathError> {
        let qname = self
            .qname(name)
            .map_err(|err| PathError::Resolution(err.to_string()))?;
        let function = self
            .registry()
            .function(&qname)
            .ok_or_else(|| PathError::UndefinedFunction(qname.to_string()))?;
        (function.func)(args)
    }
}

impl fmt::Debug for ScopeContext {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ScopeContext")
            .field("scope", &self.scope())
            .field("pointer", &self.is_pointer())
            .field("released", &self.is_released())
            .field("declared", &self.node.table.declared.borrow().keys().collect::<Vec<_>>())
            .field("components", &self.cached_components())
            .field("parent", &self.parent().map(|p| p.scope()))
            .finish()
    }
}
