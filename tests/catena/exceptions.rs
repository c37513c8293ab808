//! Exception causality across nested commands

use crate::common::{start, unit};
use catena::runtime::ComponentRegistry;
use catena::vm::{invoke, BasicCommand, CommandRef, Execution, Locator};
use catena::{ExecutionError, Fault, ScopeContext};

fn nest(
    exec: &mut Execution,
    ctx: &ScopeContext,
    commands: &[CommandRef],
    fault: &Fault,
) -> Result<(), Fault> {
    match commands.split_first() {
        Some((head, rest)) => invoke(exec, head, ctx, |exec, local| nest(exec, local, rest, fault)),
        None => Err(fault.clone()),
    }
}

#[test]
fn test_failure_report_lists_trace() {
    let (mut exec, global) = start(ComponentRegistry::new());
    let inline = BasicCommand::new("inline")
        .located(Locator::new("helper.xml", 14, 5))
        .shared();
    let commands = vec![unit("main", 1), unit("helper", 12), inline];
    let fault = Fault::msg("disk full");

    let err = nest(&mut exec, &global, &commands, &fault).unwrap_err();
    assert!(err.same(&fault));

    let failure = match exec.end_execution() {
        Err(ExecutionError::Failed(failure)) => failure,
        other => panic!("unexpected outcome: {other:?}"),
    };
    assert!(failure.causes().is_empty());
    let text = failure.to_string();
    assert_eq!(
        text,
        "an exception was thrown during the execution: disk full\n        at helper.xml:14:5\n        at main.xml:1:1"
    );
    assert_eq!(std::error::Error::source(&*failure).map(|e| e.to_string()), Some("disk full".to_string()));
}

#[test]
fn test_rethrow_with_new_fault_builds_chain() {
    let (mut exec, global) = start(ComponentRegistry::new());
    let outer = unit("outer", 2);
    let inner = unit("inner", 30);
    let root = Fault::msg("connection reset");
    let wrapped = Fault::new(anyhow::anyhow!("request aborted"));

    let err = invoke(&mut exec, &outer, &global, |exec, local| {
        let cause = invoke(exec, &inner, local, |_, _| Err(root.clone())).unwrap_err();
        assert!(cause.same(&root));
        Err(wrapped.clone())
    })
    .unwrap_err();
    assert!(err.same(&wrapped));

    let Err(ExecutionError::Failed(failure)) = exec.end_execution() else {
        panic!("run should fail");
    };
    assert!(failure.fault().same(&wrapped));
    assert_eq!(failure.causes().len(), 1);
    assert!(failure.causes()[0].0.same(&root));
    assert!(failure.to_string().contains("\n    while handling: connection reset\n        at inner.xml:30:1"));
}

#[test]
fn test_equal_content_is_not_the_same_fault() {
    let (mut exec, global) = start(ComponentRegistry::new());
    let outer = unit("outer", 2);
    let inner = unit("inner", 3);

    let _ = invoke(&mut exec, &outer, &global, |exec, local| {
        let _ = invoke(exec, &inner, local, |_, _| Err(Fault::msg("same text")));
        Err(Fault::msg("same text"))
    });

    let chain = exec.global_exception().unwrap().chain().count();
    assert_eq!(chain, 2);
}

#[test]
fn test_unrecorded_error_escapes() {
    let mut exec = Execution::new(ComponentRegistry::new().freeze());
    let result = exec.execute(
        catena::runtime::SimplePath::shared(catena::Value::Null),
        |_, _| Err(Fault::msg("outside any command")),
    );
    assert!(matches!(result, Err(ExecutionError::Escaped(_))));
    assert!(!exec.in_execution());
}
