//! Namespace prefix bindings
//!
//! Bindings are layered: a scope boundary opens a new layer whose lookups fall
//! back to the layer it was opened from, so prefixes registered inside a chain do
//! not leak out of it. Views onto the same scope share one layer.

use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

struct Layer {
    /// `None` masks a binding inherited from the parent layer.
    bindings: RefCell<IndexMap<String, Option<String>>>,
    parent: Option<Rc<Layer>>,
}

/// Layer entries replaced by an override, in application order.
#[derive(Debug, Default)]
pub struct BindingSnapshot {
    replaced: Vec<(String, Option<Option<String>>)>,
}

/// Handle to one layer of prefix → uri bindings.
#[derive(Clone)]
pub struct Namespaces {
    layer: Rc<Layer>,
}

impl Namespaces {
    /// Outermost layer seeded with `defaults`.
    pub fn root<I, P, U>(defaults: I) -> Self
    where
        I: IntoIterator<Item = (P, U)>,
        P: Into<String>,
        U: Into<String>,
    {
        let bindings = defaults
            .into_iter()
            .map(|(p, u)| (p.into(), Some(u.into())))
            .collect();
        Self {
            layer: Rc::new(Layer {
                bindings: RefCell::new(bindings),
                parent: None,
            }),
        }
    }

    /// New layer that inherits every binding of this one.
    pub fn child(&self) -> Self {
        Self {
            layer: Rc::new(Layer {
                bindings: RefCell::new(IndexMap::new()),
                parent: Some(Rc::clone(&self.layer)),
            }),
        }
    }

    /// Uri currently bound to `prefix`.
    pub fn namespace_uri(
        &self,
        prefix: &str,
    ) -> Option<String> {
        let mut layer = Some(&self.layer);
        while let Some(current) = layer {
            if let Some(binding) = current.bindings.borrow().get(prefix) {
                return binding.clone();
            }
            layer = current.parent.as_ref();
        }
        None
    }

    /// Bind `prefix` to `uri` in this layer; `None` unbinds it.
    pub fn register_namespace(
        &self,
        prefix: &str,
        uri: Option<&str>,
    ) {
        self.layer
            .bindings
            .borrow_mut()
            .insert(prefix.to_string(), uri.map(str::to_string));
    }

    /// Overwrite `mappings` in this layer, returning what they replaced.
    pub fn override_bindings<'a, I>(
        &self,
        mappings: I,
    ) -> BindingSnapshot
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut bindings = self.layer.bindings.borrow_mut();
        let replaced = mappings
            .into_iter()
            .map(|(prefix, uri)| {
                let previous = bindings.insert(prefix.clone(), Some(uri.clone()));
                (prefix.clone(), previous)
            })
            .collect();
        BindingSnapshot { replaced }
    }

    /// Undo an [`override_bindings`](Self::override_bindings) call.
    pub fn restore_bindings(
        &self,
        snapshot: BindingSnapshot,
    ) {
        let mut bindings = self.layer.bindings.borrow_mut();
        for (prefix, previous) in snapshot.replaced.into_iter().rev() {
            match previous {
                Some(binding) => {
                    bindings.insert(prefix, binding);
                }
                None => {
                    bindings.shift_remove(&prefix);
                }
            }
        }
    }

    /// Every visible binding, innermost layer winning.
    pub fn visible(&self) -> IndexMap<String, String> {
        let mut chain = Vec::new();
        let mut layer = Some(&self.layer);
        while let Some(current) = layer {
            chain.push(current);
            layer = current.parent.as_ref();
        }

        let mut visible = IndexMap::new();
        for current in chain.into_iter().rev() {
            for (prefix, uri) in current.bindings.borrow().iter() {
                match uri {
                    Some(uri) => {
                        visible.insert(prefix.clone(), uri.clone());
                    }
                    None => {
                        visible.shift_remove(prefix);
                    }
                }
            }
        }
        visible
    }

    /// Whether both handles refer to the same layer.
    pub fn ptr_eq(
        &self,
        other: &Namespaces,
    ) -> bool {
        Rc::ptr_eq(&self.layer, &other.layer)
    }
}

impl fmt::Debug for Namespaces {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_map().entries(self.visible()).finish()
    }
}
