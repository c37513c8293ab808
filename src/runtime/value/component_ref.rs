//! Shared handles to component instances

use std::any::Any;
use std::cell::{BorrowMutError, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

/// Type-erased component instance.
pub type Instance = dyn Any;

struct ComponentCell {
    type_name: &'static str,
    instance: RefCell<Box<dyn Any>>,
}

/// Identity-comparable handle to one component instance.
///
/// Clones share the instance; equality is handle identity, never structural.
#[derive(Clone)]
pub struct ComponentRef {
    inner: Rc<ComponentCell>,
}

impl ComponentRef {
    /// Wrap a freshly constructed instance.
    pub fn new<T: Any>(instance: T) -> Self {
        Self::from_boxed(std::any::type_name::<T>(), Box::new(instance))
    }

    pub(crate) fn from_boxed(
        type_name: &'static str,
        instance: Box<dyn Any>,
    ) -> Self {
        Self {
            inner: Rc::new(ComponentCell {
                type_name,
                instance: RefCell::new(instance),
            }),
        }
    }

    /// Rust type name of the instance.
    pub fn type_name(&self) -> &'static str {
        self.inner.type_name
    }

    /// Whether the instance is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.inner
            .instance
            .try_borrow()
            .map(|b| (**b).is::<T>())
            .unwrap_or(false)
    }

    /// Borrow the instance as a `T`; `None` if it is another type or mutably borrowed.
    pub fn borrow<T: Any>(&self) -> Option<Ref<'_, T>> {
        let guard = self.inner.instance.try_borrow().ok()?;
        Ref::filter_map(guard, |b| (**b).downcast_ref::<T>()).ok()
    }

    /// Mutably borrow the instance as a `T`; `None` if it is another type or already borrowed.
    pub fn borrow_mut<T: Any>(&self) -> Option<RefMut<'_, T>> {
        let guard = self.inner.instance.try_borrow_mut().ok()?;
        RefMut::filter_map(guard, |b| (**b).downcast_mut::<T>()).ok()
    }

    /// Run `f` against the type-erased instance.
    pub(crate) fn with_instance<R>(
        &self,
        f: impl FnOnce(&mut Instance) -> R,
    ) -> Result<R, BorrowMutError> {
        let mut guard = self.inner.instance.try_borrow_mut()?;
        Ok(f(&mut **guard))
    }

    /// Handle identity.
    pub fn ptr_eq(
        &self,
        other: &ComponentRef,
    ) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ComponentRef {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ComponentRef")
            .field("type", &self.inner.type_name)
            .field("addr", &Rc::as_ptr(&self.inner))
            .finish()
    }
}
