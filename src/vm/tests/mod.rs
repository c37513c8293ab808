//! 栈机模块测试
//!
//! Frame, trace, prefix-stack and executor tests for the invocation stack machine


use crate::runtime::component::ComponentRegistry;
use crate::runtime::context::ScopeContext;
use crate::runtime::path::SimplePath;
use crate::runtime::qname::QName;
use crate::runtime::value::Value;
use crate::vm::{BasicCommand, CommandRef, Execution, Locator};
use serde_json::json;

pub(super) fn machine() -> Execution {
    Execution::new(ComponentRegistry::new().freeze())
}

pub(super) fn started() -> (Execution, ScopeContext) {
    let mut exec = machine();
    let global = exec
        .start_execution(SimplePath::shared(Value::from(json!({"title": "root"}))))
        .unwrap();
    (exec, global)
}

pub(super) fn plain(name: &str) -> CommandRef {
    BasicCommand::new(name).shared()
}

pub(super) fn unit(name: &str) -> CommandRef {
    BasicCommand::new(name)
        .registered(format!("{}.xml", name), QName::new("urn:units", name))
        .located(Locator::new(format!("{}.xml", name), 3, 7))
        .shared()
}

pub(super) fn filter_unit(name: &str) -> CommandRef {
    BasicCommand::new(name)
        .filter()
        .registered(format!("{}.xml", name), QName::new("urn:units", name))
        .shared()
}
