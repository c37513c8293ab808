//! End-to-end resolver scenarios

use crate::common::{start, step, unit};
use catena::runtime::ComponentRegistry;
use catena::vm::StackKind;
use catena::{Scope, ScopeError, Value};

#[test]
fn test_variable_visible_to_nested_step() {
    let (mut exec, global) = start(ComponentRegistry::new());
    let c1 = unit("c1", 4);

    let local = exec.start_command_execute(&c1, &global).unwrap();
    assert_eq!(local.scope(), Scope::Chain);
    local.declare_variable("x", 1).unwrap();

    let s = step("s");
    let inner = exec.start_command_execute(&s, &local).unwrap();
    assert!(inner.ptr_eq(&local));
    assert_eq!(exec.depth(StackKind::Contexts), 1);
    assert_eq!(inner.get_variable("x").unwrap(), Some(Value::Int(1)));
    exec.end_command_execute(&s, &inner).unwrap();

    exec.end_command_execute(&c1, &local).unwrap();
    let err = local.get_variable_in("x", Scope::Chain).unwrap_err();
    assert!(matches!(err, ScopeError::Released(Scope::Chain)));
    exec.end_execution().unwrap();
}

#[test]
fn test_scope_lookup_reaches_ancestor() {
    let (mut exec, global) = start(ComponentRegistry::new());
    global.declare_variable("run-id", "r-17").unwrap();
    let c1 = unit("c1", 4);
    let local = exec.start_command_execute(&c1, &global).unwrap();

    assert_eq!(local.get_variable("run-id").unwrap(), None);
    assert_eq!(
        local.get_variable_in("run-id", Scope::Execution).unwrap(),
        Some(Value::from("r-17"))
    );
    assert!(matches!(
        local.get_variable_in("run-id", Scope::Request),
        Err(ScopeError::Unreachable(Scope::Request))
    ));

    local.declare_variable_in("seen", true, Scope::Execution).unwrap();
    assert_eq!(global.get_variable("seen").unwrap(), Some(Value::Bool(true)));
    exec.end_command_execute(&c1, &local).unwrap();
    exec.end_execution().unwrap();
}

#[test]
fn test_selectors_read_subject_and_variables() {
    let (mut exec, global) = start(ComponentRegistry::new());
    let c1 = unit("c1", 4);
    let local = exec.start_command_execute(&c1, &global).unwrap();
    local.declare_variable("greeting", "hello").unwrap();

    assert_eq!(local.evaluate("user/name").unwrap(), Value::from("ada"));
    assert_eq!(
        local.evaluate("catena:concat($greeting, ' ', user/name)").unwrap(),
        Value::from("hello ada")
    );
    assert_eq!(local.evaluate("catena:count(items)").unwrap(), Value::Int(3));

    exec.end_command_execute(&c1, &local).unwrap();
    exec.end_execution().unwrap();
}

#[test]
fn test_context_pointer_over_sub_subject() {
    let (mut exec, global) = start(ComponentRegistry::new());
    global.declare_variable("flag", "on").unwrap();
    let user = global.evaluate("user").unwrap();

    let view = exec.start_context_pointer(&global, user).unwrap();
    assert!(view.is_pointer());
    assert_eq!(view.evaluate("role").unwrap(), Value::from("admin"));
    assert_eq!(view.get_variable("flag").unwrap(), Some(Value::from("on")));

    exec.stop_context_pointer(&view).unwrap();
    assert_eq!(global.get_variable("flag").unwrap(), Some(Value::from("on")));
    exec.end_execution().unwrap();
}

#[test]
fn test_run_helper() {
    let c1 = unit("c1", 2);
    catena::run(ComponentRegistry::new(), Value::Null, |exec, global| {
        catena::vm::invoke(exec, &c1, global, |exec, local| {
            local.declare_variable("n", 2)?;
            assert_eq!(exec.system_id().unwrap(), "c1.xml");
            Ok(())
        })
    })
    .unwrap();
}
