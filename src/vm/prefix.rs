//! Reentrant prefix-override stack
//!
//! A command declaring prefix mappings rebinds them on its context for the
//! duration of its run. Nested defines for the same (context, command) pair only
//! bump a counter; the original bindings come back when the counter unwinds to
//! zero.

use crate::runtime::context::ScopeContext;
use crate::runtime::namespace::BindingSnapshot;
use crate::vm::command::CommandRef;
use crate::vm::errors::{ExecResult, ExecutionError, StackKind};
use indexmap::IndexMap;
use std::rc::Rc;
use tracing::debug;

struct PrefixFrame {
    context: ScopeContext,
    command: CommandRef,
    original: BindingSnapshot,
    reentries: usize,
}

impl PrefixFrame {
    fn is_for(
        &self,
        context: &ScopeContext,
        command: &CommandRef,
    ) -> bool {
        self.context.ptr_eq(context) && std::ptr::addr_eq(Rc::as_ptr(&self.command), Rc::as_ptr(command))
    }
}

#[derive(Default)]
pub struct PrefixOverrideStack {
    frames: Vec<PrefixFrame>,
}

impl PrefixOverrideStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `mappings` on `context` for `command`.
    pub fn define(
        &mut self,
        context: &ScopeContext,
        command: &CommandRef,
        mappings: &IndexMap<String, String>,
    ) {
        if let Some(top) = self.frames.last_mut() {
            if top.is_for(context, command) {
                top.reentries += 1;
                return;
            }
        }
        let original = context.namespaces().override_bindings(mappings);
        debug!("defined {} prefix mapping(s) for '{}'", mappings.len(), command.name());
        self.frames.push(PrefixFrame {
            context: context.clone(),
            command: Rc::clone(command),
            original,
            reentries: 0,
        });
    }

    /// Undo the matching [`define`](Self::define).
    pub fn undefine(
        &mut self,
        context: &ScopeContext,
        command: &CommandRef,
    ) -> ExecResult<()> {
        let top = self
            .frames
            .last_mut()
            .ok_or(ExecutionError::EmptyStack(StackKind::Prefixes))?;
        if !top.is_for(context, command) {
            return Err(ExecutionError::PrefixMismatch {
                command: command.name().to_string(),
            });
        }
        if top.reentries > 0 {
            top.reentries -= 1;
            return Ok(());
        }
        if let Some(frame) = self.frames.pop() {
            frame.context.namespaces().restore_bindings(frame.original);
        }
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Reentry count of the innermost frame.
    pub fn reentries(&self) -> usize {
        self.frames.last().map_or(0, |frame| frame.reentries)
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
