//! Component descriptor, lifecycle and registry tests


use crate::runtime::component::{ComponentDescriptor, ComponentRegistry};
use crate::runtime::context::ScopeContext;
use crate::runtime::path::SimplePath;
use crate::runtime::qname::QName;
use crate::runtime::scope::Scope;
use crate::runtime::value::Value;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

pub(super) const NS: &str = "urn:test";

#[derive(Default)]
pub(super) struct Greeter {
    pub greeting: String,
    pub name: Option<String>,
}

pub(super) fn greeter(events: Rc<RefCell<Vec<String>>>) -> ComponentDescriptor {
    let begin_events = Rc::clone(&events);
    ComponentDescriptor::of::<Greeter>(QName::new(NS, "greeter"))
        .scope(Scope::Chain)
        .field("greeting", "greeting", |g: &mut Greeter, v| {
            g.greeting = v.to_string();
            Ok(())
        })
        .on_begin("open", move |g: &mut Greeter| {
            begin_events.borrow_mut().push(format!("begin {}", g.greeting));
            Ok(())
        })
        .on_end("close", move |g: &mut Greeter| {
            events.borrow_mut().push(format!("end {}", g.greeting));
            Ok(())
        })
        .build()
}

pub(super) fn chain_context(registry: ComponentRegistry) -> ScopeContext {
    let root = ScopeContext::new(
        Scope::Execution,
        registry.freeze(),
        SimplePath::shared(Value::from(json!({"greeting": "hello"}))),
        None,
    );
    let chain = root.child(Rc::clone(root.path()));
    chain.set_warn_unreleased(false);
    chain
}
