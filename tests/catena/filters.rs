//! Filter suspension and post-processing

use crate::common::{filter, start, unit};
use catena::runtime::ComponentRegistry;
use catena::vm::{invoke, post_process, BasicCommand, Disposition, StackKind};
use catena::{ExecutionError, Fault};
use std::rc::Rc;

#[test]
fn test_filter_resumes_after_downstream() {
    let (mut exec, global) = start(ComponentRegistry::new());
    let f = filter("audit");
    let downstream = unit("work", 5);

    let local = exec.start_command_execute(&f, &global).unwrap();
    local.declare_variable("opened", true).unwrap();
    let entry = Rc::clone(exec.current_trace().unwrap());
    exec.end_command_execute(&f, &local).unwrap();

    let work = exec.start_command_execute(&downstream, &global).unwrap();
    assert!(work.parent().unwrap().ptr_eq(&global));
    assert_eq!(exec.execution_trace().len(), 1);
    assert_eq!(exec.system_id().unwrap(), "work.xml");
    exec.end_command_execute(&downstream, &work).unwrap();

    let resumed = exec.start_command_post_process(&f, &global).unwrap();
    assert!(resumed.ptr_eq(&local));
    assert!(Rc::ptr_eq(exec.current_trace().unwrap(), &entry));
    assert_eq!(resumed.get_variable("opened").unwrap(), Some(catena::Value::Bool(true)));
    exec.end_command_post_process(&f, &resumed).unwrap();

    assert!(local.is_released());
    assert!(matches!(
        exec.start_command_post_process(&f, &global),
        Err(ExecutionError::EmptyStack(StackKind::SuspendedFrames))
    ));
    exec.end_execution().unwrap();
}

#[test]
fn test_unregistered_filter_keeps_context() {
    let (mut exec, global) = start(ComponentRegistry::new());
    let f = BasicCommand::new("inline").filter().shared();

    let ctx = exec.start_command_execute(&f, &global).unwrap();
    assert!(ctx.ptr_eq(&global));
    exec.end_command_execute(&f, &ctx).unwrap();
    assert_eq!(exec.depth(StackKind::SuspendedFrames), 1);
    assert_eq!(exec.depth(StackKind::SuspendedContexts), 0);

    let ctx = exec.start_command_post_process(&f, &global).unwrap();
    assert!(ctx.ptr_eq(&global));
    exec.end_command_post_process(&f, &ctx).unwrap();
    exec.end_execution().unwrap();
}

#[test]
fn test_filters_resume_in_reverse_order() {
    let (mut exec, global) = start(ComponentRegistry::new());
    let outer = filter("outer");
    let inner = filter("inner");

    for f in [&outer, &inner] {
        invoke(&mut exec, f, &global, |_, _| Ok(())).unwrap();
    }
    assert_eq!(exec.depth(StackKind::SuspendedFrames), 2);
    assert!(matches!(
        exec.start_command_post_process(&outer, &global),
        Err(ExecutionError::CommandMismatch { .. })
    ));

    let mut order = Vec::new();
    for f in [&inner, &outer] {
        post_process(&mut exec, f, &global, None, |exec, _, _| {
            order.push(exec.system_id().unwrap().to_string());
            Ok(Disposition::Propagate)
        })
        .unwrap();
    }
    assert_eq!(order, vec!["inner.xml", "outer.xml"]);
    exec.end_execution().unwrap();
}

#[test]
fn test_filter_suppresses_downstream_failure() {
    let (mut exec, global) = start(ComponentRegistry::new());
    let guard = filter("guard");
    let work = unit("work", 9);
    let fault = Fault::msg("work failed");

    invoke(&mut exec, &guard, &global, |_, _| Ok(())).unwrap();
    let pending = invoke(&mut exec, &work, &global, |_, _| Err(fault.clone())).unwrap_err();
    assert!(pending.same(&fault));

    post_process(&mut exec, &guard, &global, Some(&pending), |_, _, pending| {
        assert!(pending.is_some());
        Ok(Disposition::Handled)
    })
    .unwrap();
    exec.end_execution().unwrap();
}
