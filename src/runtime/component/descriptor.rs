//! Component descriptors
//!
//! Descriptors are built once, when the embedder populates its registry, and are
//! read-only afterwards. The builder captures typed closures per component type
//! and erases them, so no reflection happens on the lookup path.

use crate::runtime::qname::QName;
use crate::runtime::scope::Scope;
use crate::runtime::value::{Instance, Value};
use anyhow::anyhow;
use indexmap::IndexMap;
use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

pub(crate) type Constructor = Rc<dyn Fn() -> anyhow::Result<Box<Instance>>>;
pub(crate) type Injector = Rc<dyn Fn(&mut Instance, Value) -> anyhow::Result<()>>;
pub(crate) type Hook = Rc<dyn Fn(&mut Instance) -> anyhow::Result<()>>;

/// Where an injected value goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionTarget {
    Field(String),
    Setter(String),
}

impl fmt::Display for InjectionTarget {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            InjectionTarget::Field(name) => write!(f, "field '{}'", name),
            InjectionTarget::Setter(name) => write!(f, "method '{}'", name),
        }
    }
}

/// Declaration of one injection, before it is bound to a setter closure.
#[derive(Debug, Clone)]
pub struct Injection {
    select: String,
    prefix_mappings: IndexMap<String, String>,
    nullable: bool,
    target: InjectionTarget,
}

impl Injection {
    pub fn field(
        name: &str,
        select: &str,
    ) -> Self {
        Self::new(InjectionTarget::Field(name.to_string()), select)
    }

    pub fn setter(
        name: &str,
        select: &str,
    ) -> Self {
        Self::new(InjectionTarget::Setter(name.to_string()), select)
    }

    fn new(
        target: InjectionTarget,
        select: &str,
    ) -> Self {
        Self {
            select: select.to_string(),
            prefix_mappings: IndexMap::new(),
            nullable: false,
            target,
        }
    }

    /// Failures to evaluate or assign leave the target unset instead of failing.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Bind `prefix` to `uri` while the selector is evaluated.
    pub fn prefix(
        mut self,
        prefix: &str,
        uri: &str,
    ) -> Self {
        self.prefix_mappings
            .insert(prefix.to_string(), uri.to_string());
        self
    }
}

/// One field or setter populated from a selector.
#[derive(Clone)]
pub struct InjectionPoint {
    injection: Injection,
    inject: Injector,
}

impl InjectionPoint {
    pub fn select(&self) -> &str {
        &self.injection.select
    }

    pub fn prefix_mappings(&self) -> &IndexMap<String, String> {
        &self.injection.prefix_mappings
    }

    pub fn is_nullable(&self) -> bool {
        self.injection.nullable
    }

    pub fn target(&self) -> &InjectionTarget {
        &self.injection.target
    }

    pub(crate) fn assign(
        &self,
        instance: &mut Instance,
        value: Value,
    ) -> anyhow::Result<()> {
        (self.inject)(instance, value)
    }
}

impl fmt::Debug for InjectionPoint {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("InjectionPoint")
            .field("select", &self.injection.select)
            .field("target", &self.injection.target)
            .field("nullable", &self.injection.nullable)
            .field("prefix_mappings", &self.injection.prefix_mappings)
            .finish()
    }
}

#[derive(Clone)]
pub(crate) struct NamedHook {
    pub(crate) name: String,
    pub(crate) run: Hook,
}

/// Immutable metadata describing how to construct, inject and release a component.
pub struct ComponentDescriptor {
    type_name: &'static str,
    name: QName,
    scope: Scope,
    construct: Constructor,
    injections: Vec<InjectionPoint>,
    begin: Vec<NamedHook>,
    end: Vec<NamedHook>,
}

impl ComponentDescriptor {
    /// Descriptor builder for a component constructed with `T::default()`.
    pub fn of<T: Any + Default>(name: QName) -> DescriptorBuilder<T> {
        Self::with_constructor(name, || Ok(T::default()))
    }

    /// Descriptor builder for a component built by `construct`.
    pub fn with_constructor<T, F>(
        name: QName,
        construct: F,
    ) -> DescriptorBuilder<T>
    where
        T: Any,
        F: Fn() -> anyhow::Result<T> + 'static,
    {
        DescriptorBuilder {
            name,
            scope: Scope::Execution,
            construct: Rc::new(construct),
            injections: Vec::new(),
            begin: Vec::new(),
            end: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Rust type of the instances.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Qualified name the component is looked up by.
    pub fn name(&self) -> &QName {
        &self.name
    }

    pub fn local_name(&self) -> &str {
        self.name.local_name()
    }

    /// Scope whose context nodes own the instances.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn injections(&self) -> &[InjectionPoint] {
        &self.injections
    }

    pub fn begin_hooks(&self) -> impl Iterator<Item = &str> {
        self.begin.iter().map(|h| h.name.as_str())
    }

    pub fn end_hooks(&self) -> impl Iterator<Item = &str> {
        self.end.iter().map(|h| h.name.as_str())
    }

    pub(crate) fn construct(&self) -> anyhow::Result<Box<Instance>> {
        (self.construct)()
    }

    pub(crate) fn begin(&self) -> &[NamedHook] {
        &self.begin
    }

    pub(crate) fn end(&self) -> &[NamedHook] {
        &self.end
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("name", &self.name)
            .field("type", &self.type_name)
            .field("scope", &self.scope)
            .field("injections", &self.injections)
            .field("begin", &self.begin.iter().map(|h| &h.name).collect::<Vec<_>>())
            .field("end", &self.end.iter().map(|h| &h.name).collect::<Vec<_>>())
            .finish()
    }
}

type TypedSetter<T> = Rc<dyn Fn(&mut T, Value) -> anyhow::Result<()>>;
type TypedHook<T> = Rc<dyn Fn(&mut T) -> anyhow::Result<()>>;

/// Typed builder for a [`ComponentDescriptor`].
///
/// Setter and hook closures see the concrete component type; they are erased when
/// the descriptor is built.
pub struct DescriptorBuilder<T> {
    name: QName,
    scope: Scope,
    construct: Rc<dyn Fn() -> anyhow::Result<T>>,
    injections: Vec<(Injection, TypedSetter<T>)>,
    begin: Vec<(String, TypedHook<T>)>,
    end: Vec<(String, TypedHook<T>)>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any> DescriptorBuilder<T> {
    /// Owning scope; defaults to [`Scope::Execution`].
    pub fn scope(
        mut self,
        scope: Scope,
    ) -> Self {
        self.scope = scope;
        self
    }

    /// Add an injection point.
    pub fn inject<F>(
        mut self,
        injection: Injection,
        set: F,
    ) -> Self
    where
        F: Fn(&mut T, Value) -> anyhow::Result<()> + 'static,
    {
        self.injections.push((injection, Rc::new(set)));
        self
    }

    /// Shorthand for a non-nullable field injection.
    pub fn field<F>(
        self,
        name: &str,
        select: &str,
        set: F,
    ) -> Self
    where
        F: Fn(&mut T, Value) -> anyhow::Result<()> + 'static,
    {
        self.inject(Injection::field(name, select), set)
    }

    /// Shorthand for a non-nullable setter injection.
    pub fn setter<F>(
        self,
        name: &str,
        select: &str,
        set: F,
    ) -> Self
    where
        F: Fn(&mut T, Value) -> anyhow::Result<()> + 'static,
    {
        self.inject(Injection::setter(name, select), set)
    }

    /// Hook run after injection, before the instance is cached.
    pub fn on_begin<F>(
        mut self,
        name: &str,
        hook: F,
    ) -> Self
    where
        F: Fn(&mut T) -> anyhow::Result<()> + 'static,
    {
        self.begin.push((name.to_string(), Rc::new(hook)));
        self
    }

    /// Hook run when the owning scope context is released.
    pub fn on_end<F>(
        mut self,
        name: &str,
        hook: F,
    ) -> Self
    where
        F: Fn(&mut T) -> anyhow::Result<()> + 'static,
    {
        self.end.push((name.to_string(), Rc::new(hook)));
        self
    }

    /// Inherit the injection points and hooks declared for an embedded part `P`.
    ///
    /// `project` selects the part inside `T`; the part's own points come after the
    /// ones already declared, the way inherited members follow declared ones.
    pub fn embed<P: Any>(
        mut self,
        part: DescriptorBuilder<P>,
        project: fn(&mut T) -> &mut P,
    ) -> Self {
        for (injection, set) in part.injections {
            self.injections.push((
                injection,
                Rc::new(move |target: &mut T, value| set(project(target), value)),
            ));
        }
        for (name, hook) in part.begin {
            self.begin
                .push((name, Rc::new(move |target: &mut T| hook(project(target)))));
        }
        for (name, hook) in part.end {
            self.end
                .push((name, Rc::new(move |target: &mut T| hook(project(target)))));
        }
        self
    }

    /// Freeze into a type-erased descriptor.
    pub fn build(self) -> ComponentDescriptor {
        let construct = self.construct;
        ComponentDescriptor {
            type_name: type_name::<T>(),
            name: self.name,
            scope: self.scope,
            construct: Rc::new(move || Ok(Box::new(construct()?) as Box<Instance>)),
            injections: self
                .injections
                .into_iter()
                .map(|(injection, set)| InjectionPoint {
                    injection,
                    inject: Rc::new(move |instance: &mut Instance, value| set(downcast::<T>(instance)?, value)),
                })
                .collect(),
            begin: self.begin.into_iter().map(erase_hook).collect(),
            end: self.end.into_iter().map(erase_hook).collect(),
        }
    }
}

fn erase_hook<T: Any>((name, hook): (String, TypedHook<T>)) -> NamedHook {
    NamedHook {
        name,
        run: Rc::new(move |instance: &mut Instance| hook(downcast::<T>(instance)?)),
    }
}

fn downcast<T: Any>(instance: &mut Instance) -> anyhow::Result<&mut T> {
    instance
        .downcast_mut::<T>()
        .ok_or_else(|| anyhow!("component instance is not a {}", type_name::<T>()))
}
