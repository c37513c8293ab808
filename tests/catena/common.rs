//! Shared fixtures for the integration tests

use catena::runtime::path::SimplePath;
use catena::runtime::{ComponentRegistry, QName};
use catena::vm::{BasicCommand, CommandRef, Locator};
use catena::{Execution, ScopeContext, Value};
use serde_json::json;

pub const UNITS: &str = "urn:units";

pub fn start(registry: ComponentRegistry) -> (Execution, ScopeContext) {
    let mut exec = Execution::new(registry.freeze());
    let global = exec
        .start_execution(SimplePath::shared(Value::from(json!({
            "user": {"name": "ada", "role": "admin"},
            "items": [1, 2, 3]
        }))))
        .unwrap();
    (exec, global)
}

/// A registered command unit loaded from `<name>.xml`, line `line`.
pub fn unit(
    name: &str,
    line: u32,
) -> CommandRef {
    BasicCommand::new(name)
        .registered(format!("{}.xml", name), QName::new(UNITS, name))
        .located(Locator::new(format!("{}.xml", name), line, 1))
        .shared()
}

pub fn step(name: &str) -> CommandRef {
    BasicCommand::new(name).shared()
}

pub fn filter(name: &str) -> CommandRef {
    BasicCommand::new(name)
        .filter()
        .registered(format!("{}.xml", name), QName::new(UNITS, name))
        .located(Locator::new(format!("{}.xml", name), 1, 1))
        .shared()
}
