//! Property tests for stack discipline and exception de-duplication

use crate::common::{filter, start, step, unit};
use catena::runtime::ComponentRegistry;
use catena::vm::{invoke, Execution, StackKind};
use catena::{Fault, ScopeContext, Value};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Shape {
    Step(Vec<Shape>),
    Unit(Vec<Shape>),
    Filter(Vec<Shape>),
    Pointer(Vec<Shape>),
}

fn shape() -> impl Strategy<Value = Shape> {
    let leaf = Just(Shape::Step(Vec::new()));
    leaf.prop_recursive(4, 24, 3, |inner| {
        let children = prop::collection::vec(inner, 0..3);
        prop_oneof![
            children.clone().prop_map(Shape::Step),
            children.clone().prop_map(Shape::Unit),
            children.clone().prop_map(Shape::Filter),
            children.prop_map(Shape::Pointer),
        ]
    })
}

fn walk(
    exec: &mut Execution,
    ctx: &ScopeContext,
    shape: &Shape,
    id: &mut usize,
) {
    *id += 1;
    let name = format!("n{}", id);
    match shape {
        Shape::Step(children) | Shape::Unit(children) => {
            let command = match shape {
                Shape::Step(_) => step(&name),
                _ => unit(&name, 1),
            };
            let local = exec.start_command_execute(&command, ctx).unwrap();
            if matches!(shape, Shape::Unit(_)) {
                assert!(local.parent().unwrap().ptr_eq(ctx));
            }
            for child in children {
                walk(exec, &local, child, id);
            }
            let back = exec.end_command_execute(&command, &local).unwrap();
            assert!(back.ptr_eq(ctx));
        }
        Shape::Filter(children) => {
            let command = filter(&name);
            let local = exec.start_command_execute(&command, ctx).unwrap();
            exec.end_command_execute(&command, &local).unwrap();
            for child in children {
                walk(exec, ctx, child, id);
            }
            let resumed = exec.start_command_post_process(&command, ctx).unwrap();
            assert!(resumed.ptr_eq(&local));
            exec.end_command_post_process(&command, &resumed).unwrap();
        }
        Shape::Pointer(children) => {
            let view = exec.start_context_pointer(ctx, Value::Int(*id as i64)).unwrap();
            for child in children {
                walk(exec, &view, child, id);
            }
            let back = exec.stop_context_pointer(&view).unwrap();
            assert!(back.ptr_eq(ctx));
        }
    }
}

fn throw_through(
    exec: &mut Execution,
    ctx: &ScopeContext,
    depth: usize,
    root: &Fault,
    distinct: bool,
) -> Result<(), Fault> {
    if depth == 0 {
        return Err(root.clone());
    }
    let command = unit(&format!("level{}", depth), depth as u32);
    invoke(exec, &command, ctx, |exec, local| {
        let err = throw_through(exec, local, depth - 1, root, distinct).unwrap_err();
        if distinct {
            Err(Fault::msg(format!("level {} failed", depth)))
        } else {
            Err(err)
        }
    })
}

proptest! {
    #[test]
    fn prop_well_nested_runs_leave_empty_stacks(shapes in prop::collection::vec(shape(), 1..4)) {
        let (mut exec, global) = start(ComponentRegistry::new());
        let mut id = 0;
        for s in &shapes {
            walk(&mut exec, &global, s, &mut id);
        }

        prop_assert_eq!(exec.depth(StackKind::Frames), 1);
        for stack in [
            StackKind::SuspendedFrames,
            StackKind::Trace,
            StackKind::SuspendedTrace,
            StackKind::Contexts,
            StackKind::SuspendedContexts,
            StackKind::Prefixes,
        ] {
            prop_assert_eq!(exec.depth(stack), 0);
        }
        prop_assert!(exec.end_execution().is_ok());
        prop_assert_eq!(exec.depth(StackKind::Frames), 0);
    }

    #[test]
    fn prop_rethrown_fault_keeps_one_context(depth in 1usize..12) {
        let (mut exec, global) = start(ComponentRegistry::new());
        let root = Fault::msg("root");
        let err = throw_through(&mut exec, &global, depth, &root, false).unwrap_err();
        prop_assert!(err.same(&root));
        prop_assert_eq!(exec.global_exception().unwrap().chain().count(), 1);
    }

    #[test]
    fn prop_distinct_faults_chain_per_frame(depth in 1usize..12) {
        let (mut exec, global) = start(ComponentRegistry::new());
        let root = Fault::msg("root");
        throw_through(&mut exec, &global, depth, &root, true).unwrap_err();
        prop_assert_eq!(exec.global_exception().unwrap().chain().count(), depth);
    }
}
