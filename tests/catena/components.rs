//! Component lifecycle through the stack machine

use crate::common::{start, unit, UNITS};
use catena::runtime::{ComponentDescriptor, ComponentRegistry, Injection, QName};
use catena::vm::invoke;
use catena::{ExecutionError, Fault, Scope, Value};
use std::cell::RefCell;
use std::rc::Rc;

type Log = Rc<RefCell<Vec<String>>>;

#[derive(Default)]
struct Session {
    user: String,
    role: Option<String>,
}

#[derive(Default)]
struct Counter {
    hits: i64,
}

fn session(log: &Log) -> ComponentDescriptor {
    let log = Rc::clone(log);
    ComponentDescriptor::of::<Session>(QName::new(UNITS, "session"))
        .scope(Scope::Chain)
        .field("user", "user/name", |s: &mut Session, v| {
            s.user = v.to_string();
            Ok(())
        })
        .inject(Injection::setter("set_role", "$role").nullable(), |s: &mut Session, v| {
            s.role = Some(v.to_string());
            Ok(())
        })
        .on_end("close", move |s: &mut Session| {
            log.borrow_mut().push(format!("close {}", s.user));
            Ok(())
        })
        .build()
}

#[test]
fn test_nullable_point_left_unset() {
    let log = Log::default();
    let mut registry = ComponentRegistry::new();
    registry.register(session(&log)).unwrap();
    let (mut exec, global) = start(registry);

    let c1 = unit("c1", 1);
    let local = exec.start_command_execute(&c1, &global).unwrap();
    let value = local.get_variable(&QName::new(UNITS, "session")).unwrap().unwrap();
    let Value::Component(component) = value else {
        panic!("expected a component");
    };
    let session = component.borrow::<Session>().unwrap();
    assert_eq!(session.user, "ada");
    assert!(session.role.is_none());
    drop(session);

    exec.end_command_execute(&c1, &local).unwrap();
    assert_eq!(*log.borrow(), vec!["close ada".to_string()]);
    exec.end_execution().unwrap();
}

#[test]
fn test_each_chain_gets_its_own_instance() {
    let log = Log::default();
    let mut registry = ComponentRegistry::new();
    registry.register(session(&log)).unwrap();
    let (mut exec, global) = start(registry);
    let name = QName::new(UNITS, "session");

    let outer = unit("outer", 1);
    let inner = unit("inner", 2);
    let outer_ctx = exec.start_command_execute(&outer, &global).unwrap();
    let first = outer_ctx.get_component(&name).unwrap().unwrap();
    let inner_ctx = exec.start_command_execute(&inner, &outer_ctx).unwrap();
    let second = inner_ctx.get_component(&name).unwrap().unwrap();
    assert!(!first.ptr_eq(&second));

    exec.end_command_execute(&inner, &inner_ctx).unwrap();
    assert_eq!(log.borrow().len(), 1);
    exec.end_command_execute(&outer, &outer_ctx).unwrap();
    assert_eq!(log.borrow().len(), 2);
    exec.end_execution().unwrap();
}

#[test]
fn test_execution_component_shared_by_chains() {
    let mut registry = ComponentRegistry::new();
    registry
        .register(
            ComponentDescriptor::of::<Counter>(QName::new(UNITS, "counter"))
                .scope(Scope::Execution)
                .build(),
        )
        .unwrap();
    let (mut exec, global) = start(registry);
    let name = QName::new(UNITS, "counter");

    for line in 1..=3 {
        let c = unit("step", line);
        let local = exec.start_command_execute(&c, &global).unwrap();
        let Some(Value::Component(counter)) = local.get_variable(&name).unwrap() else {
            panic!("counter not resolved");
        };
        counter.borrow_mut::<Counter>().unwrap().hits += 1;
        assert!(local.cached_components().is_empty());
        exec.end_command_execute(&c, &local).unwrap();
    }

    let counter = global.get_component(&name).unwrap().unwrap();
    assert_eq!(counter.borrow::<Counter>().unwrap().hits, 3);
    exec.end_execution().unwrap();
}

#[test]
fn test_release_continues_after_failing_hook() {
    let log = Log::default();
    let mut registry = ComponentRegistry::new();
    for name in ["first", "second"] {
        let log = Rc::clone(&log);
        registry
            .register(
                ComponentDescriptor::of::<Counter>(QName::new(UNITS, name))
                    .scope(Scope::Chain)
                    .on_end("close", move |_: &mut Counter| {
                        log.borrow_mut().push(name.to_string());
                        if name == "first" {
                            anyhow::bail!("first refuses to close");
                        }
                        Ok(())
                    })
                    .build(),
            )
            .unwrap();
    }
    let (mut exec, global) = start(registry);

    let c1 = unit("c1", 1);
    let local = exec.start_command_execute(&c1, &global).unwrap();
    local.get_component(&QName::new(UNITS, "first")).unwrap();
    local.get_component(&QName::new(UNITS, "second")).unwrap();
    assert_eq!(local.cached_components().len(), 2);

    local.release_components();
    assert_eq!(*log.borrow(), vec!["first".to_string(), "second".to_string()]);
    assert!(local.cached_components().is_empty());

    exec.end_command_execute(&c1, &local).unwrap();
    assert_eq!(log.borrow().len(), 2);
    exec.end_execution().unwrap();
}

fn logged_counter(
    name: &str,
    scope: Scope,
    log: &Log,
) -> ComponentDescriptor {
    let log = Rc::clone(log);
    let label = name.to_string();
    ComponentDescriptor::of::<Counter>(QName::new(UNITS, name))
        .scope(scope)
        .on_end("close", move |_: &mut Counter| {
            log.borrow_mut().push(format!("close {}", label));
            Ok(())
        })
        .build()
}

#[test]
fn test_failed_run_still_releases_execution_components() {
    let log = Log::default();
    let mut registry = ComponentRegistry::new();
    registry.register(logged_counter("tally", Scope::Execution, &log)).unwrap();
    let (mut exec, global) = start(registry);
    global.get_component(&QName::new(UNITS, "tally")).unwrap().unwrap();

    let c1 = unit("c1", 1);
    let fault = Fault::msg("c1 failed");
    let err = invoke(&mut exec, &c1, &global, |_, _| Err(fault.clone())).unwrap_err();
    assert!(err.same(&fault));
    assert!(log.borrow().is_empty());

    assert!(matches!(exec.end_execution(), Err(ExecutionError::Failed(_))));
    assert_eq!(*log.borrow(), vec!["close tally".to_string()]);
    assert!(global.is_released());
}

#[test]
fn test_failing_command_releases_its_components() {
    let log = Log::default();
    let mut registry = ComponentRegistry::new();
    registry.register(logged_counter("scratch", Scope::Chain, &log)).unwrap();
    let (mut exec, global) = start(registry);

    let c1 = unit("c1", 1);
    let fault = Fault::msg("c1 failed");
    let mut seen = None;
    let err = invoke(&mut exec, &c1, &global, |_, local| {
        local.get_component(&QName::new(UNITS, "scratch"))?;
        seen = Some(local.clone());
        Err(fault.clone())
    })
    .unwrap_err();
    assert!(err.same(&fault));

    let local = seen.unwrap();
    assert!(local.is_released());
    assert!(local.cached_components().is_empty());
    assert_eq!(*log.borrow(), vec!["close scratch".to_string()]);

    assert!(matches!(exec.end_execution(), Err(ExecutionError::Failed(_))));
    assert_eq!(log.borrow().len(), 1);
}
