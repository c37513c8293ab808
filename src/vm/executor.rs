//! Invocation stack machine
//!
//! One [`Execution`] holds the state of one run on one thread: active and
//! suspended invocation frames, active and suspended trace entries, active and
//! suspended scope contexts, and the prefix-override stack.
//!
//! Every `end`/`stop` call must name the exact context and command on top of the
//! stacks. Filters are the one exception to plain LIFO order: ending a filter
//! moves its frame (and, for a registered filter, its context and trace entry) to
//! the suspended stacks, and its post-processing moves them back.

use crate::runtime::component::ComponentRegistry;
use crate::runtime::context::ScopeContext;
use crate::runtime::path::PathContext;
use crate::runtime::scope::Scope;
use crate::runtime::value::Value;
use crate::util::config::{EngineConfig, EngineSection};
use crate::vm::command::CommandRef;
use crate::vm::errors::{ExecResult, ExecutionError, ExecutionFailure, StackKind};
use crate::vm::fault::Fault;
use crate::vm::frames::{ExceptionContext, FrameKind, InvocationFrame, Locator, TraceElement, TraceEntry, TraceSnapshot};
use crate::vm::prefix::PrefixOverrideStack;
use std::rc::Rc;
use tracing::{debug, trace};

/// Per-run execution state.
pub struct Execution {
    settings: EngineSection,
    registry: Rc<ComponentRegistry>,
    global: Option<ScopeContext>,
    frames: Vec<InvocationFrame>,
    suspended_frames: Vec<InvocationFrame>,
    trace: Vec<Rc<TraceEntry>>,
    suspended_trace: Vec<Rc<TraceEntry>>,
    contexts: Vec<ScopeContext>,
    suspended_contexts: Vec<ScopeContext>,
    prefixes: PrefixOverrideStack,
}

impl Execution {
    pub fn new(registry: Rc<ComponentRegistry>) -> Self {
        Self::with_settings(registry, EngineSection::default())
    }

    /// Machine using the `[engine]` section of `config`.
    pub fn with_config(
        registry: Rc<ComponentRegistry>,
        config: &EngineConfig,
    ) -> Self {
        Self::with_settings(registry, config.engine.clone())
    }

    fn with_settings(
        registry: Rc<ComponentRegistry>,
        settings: EngineSection,
    ) -> Self {
        Self {
            settings,
            registry,
            global: None,
            frames: Vec::new(),
            suspended_frames: Vec::new(),
            trace: Vec::new(),
            suspended_trace: Vec::new(),
            contexts: Vec::new(),
            suspended_contexts: Vec::new(),
            prefixes: PrefixOverrideStack::new(),
        }
    }

    pub fn registry(&self) -> &Rc<ComponentRegistry> {
        &self.registry
    }

    // ---------------------------------------------------------------------
    // Run lifecycle
    // ---------------------------------------------------------------------

    /// Begin a run over `root`, returning the global context.
    pub fn start_execution(
        &mut self,
        root: Rc<dyn PathContext>,
    ) -> ExecResult<ScopeContext> {
        self.begin(ScopeContext::new(Scope::Execution, Rc::clone(&self.registry), root, None))
    }

    /// Begin a run nested in a caller-held context (usually a request context).
    pub fn start_execution_within(
        &mut self,
        parent: &ScopeContext,
    ) -> ExecResult<ScopeContext> {
        self.begin(parent.child(Rc::clone(parent.path())))
    }

    fn begin(
        &mut self,
        global: ScopeContext,
    ) -> ExecResult<ScopeContext> {
        if self.global.is_some() {
            return Err(ExecutionError::AlreadyRunning);
        }
        global.set_warn_unreleased(self.settings.warn_unreleased);
        self.frames.push(InvocationFrame::global());
        self.global = Some(global.clone());
        debug!("execution started at {} scope", global.scope());
        Ok(global)
    }

    /// End the run, clearing every stack and releasing every context.
    ///
    /// Fails with [`ExecutionError::Failed`] when the run recorded an error no
    /// filter handled.
    pub fn end_execution(&mut self) -> ExecResult<()> {
        let global = self.global.take().ok_or(ExecutionError::NotRunning)?;
        let failure = self
            .frames
            .first()
            .and_then(|frame| frame.exception.as_ref())
            .filter(|ctx| !ctx.is_handled())
            .map(|ctx| ExecutionFailure::from_context(ctx));

        self.frames.clear();
        self.suspended_frames.clear();
        self.trace.clear();
        self.suspended_trace.clear();
        self.prefixes.clear();
        for ctx in self.contexts.drain(..).rev().chain(self.suspended_contexts.drain(..).rev()) {
            ctx.end();
        }
        global.end();
        debug!("execution ended");

        match failure {
            Some(failure) => Err(ExecutionError::Failed(Box::new(failure))),
            None => Ok(()),
        }
    }

    /// Run `body` between `start_execution` and `end_execution`.
    ///
    /// An error `body` returns without it having been recorded through
    /// [`exception_thrown`](Self::exception_thrown) is reported as
    /// [`ExecutionError::Escaped`].
    pub fn execute<F>(
        &mut self,
        root: Rc<dyn PathContext>,
        body: F,
    ) -> ExecResult<()>
    where
        F: FnOnce(&mut Execution, &ScopeContext) -> Result<(), Fault>,
    {
        let global = self.start_execution(root)?;
        let outcome = body(self, &global);
        self.end_execution()?;
        outcome.map_err(ExecutionError::Escaped)
    }

    // ---------------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------------

    /// Enter `command`, returning the context its body runs in.
    ///
    /// A registered command opens a child of the current context; any other
    /// command must be handed the current context.
    pub fn start_command_execute(
        &mut self,
        command: &CommandRef,
        ctx: &ScopeContext,
    ) -> ExecResult<ScopeContext> {
        let current = self.current_context()?;
        if self.frames.len() >= self.settings.max_depth {
            return Err(ExecutionError::CallDepthExceeded(self.settings.max_depth));
        }

        match command.registration() {
            Some(registration) => {
                let local = current.child(Rc::clone(ctx.path()));
                self.frames.push(InvocationFrame::for_command(command));
                self.contexts.push(local);
                self.trace.push(TraceEntry::new(registration));
                debug!("entered '{}' as {}", command.name(), registration.qname);
            }
            None => {
                if !ctx.ptr_eq(&current) {
                    return Err(ExecutionError::UnregisteredEntry {
                        command: command.name().to_string(),
                    });
                }
                self.frames.push(InvocationFrame::for_command(command));
            }
        }

        self.update_trace_location();
        let local = self.current_context()?;
        if let Some(mappings) = command.prefix_mappings() {
            self.prefixes.define(&local, command, mappings);
        }
        Ok(local)
    }

    /// Leave `command` after its body, returning the context now current.
    pub fn end_command_execute(
        &mut self,
        command: &CommandRef,
        ctx: &ScopeContext,
    ) -> ExecResult<ScopeContext> {
        self.test_current_context(ctx, "end_command_execute")?;
        self.test_current_command(command, "end_command_execute")?;
        if command.prefix_mappings().is_some() {
            self.prefixes.undefine(ctx, command)?;
        }

        let frame = self.frames.pop().ok_or(ExecutionError::EmptyStack(StackKind::Frames))?;
        if command.is_filter() {
            self.suspended_frames.push(frame);
            if command.is_boundary() {
                let local = self.pop_context()?;
                self.suspended_contexts.push(local);
                let entry = self.trace.pop().ok_or(ExecutionError::EmptyStack(StackKind::Trace))?;
                self.suspended_trace.push(entry);
            }
            debug!("suspended filter '{}'", command.name());
        } else if command.is_boundary() {
            self.pop_context()?.end();
            self.trace.pop().ok_or(ExecutionError::EmptyStack(StackKind::Trace))?;
            debug!("left '{}'", command.name());
        }

        self.update_trace_location();
        self.current_context()
    }

    /// Resume a filter suspended by [`end_command_execute`](Self::end_command_execute).
    pub fn start_command_post_process(
        &mut self,
        command: &CommandRef,
        ctx: &ScopeContext,
    ) -> ExecResult<ScopeContext> {
        self.test_current_context(ctx, "start_command_post_process")?;
        let suspended = self
            .suspended_frames
            .last()
            .ok_or(ExecutionError::EmptyStack(StackKind::SuspendedFrames))?;
        if !suspended.is_for(command) {
            return Err(mismatch("start_command_post_process", suspended, command));
        }
        if command.is_boundary() {
            if self.suspended_contexts.is_empty() {
                return Err(ExecutionError::EmptyStack(StackKind::SuspendedContexts));
            }
            if self.suspended_trace.is_empty() {
                return Err(ExecutionError::EmptyStack(StackKind::SuspendedTrace));
            }
        }

        if let Some(frame) = self.suspended_frames.pop() {
            self.frames.push(frame);
        }
        if command.is_boundary() {
            if let Some(local) = self.suspended_contexts.pop() {
                self.contexts.push(local);
            }
            if let Some(entry) = self.suspended_trace.pop() {
                self.trace.push(entry);
            }
        }
        debug!("resumed filter '{}'", command.name());

        self.update_trace_location();
        let local = self.current_context()?;
        if let Some(mappings) = command.prefix_mappings() {
            self.prefixes.define(&local, command, mappings);
        }
        Ok(local)
    }

    /// Finish a filter's post-processing and release its frame.
    pub fn end_command_post_process(
        &mut self,
        command: &CommandRef,
        ctx: &ScopeContext,
    ) -> ExecResult<ScopeContext> {
        self.test_current_context(ctx, "end_command_post_process")?;
        self.test_current_command(command, "end_command_post_process")?;
        if command.prefix_mappings().is_some() {
            self.prefixes.undefine(ctx, command)?;
        }

        self.frames.pop().ok_or(ExecutionError::EmptyStack(StackKind::Frames))?;
        if command.is_boundary() {
            self.pop_context()?.end();
            self.trace.pop().ok_or(ExecutionError::EmptyStack(StackKind::Trace))?;
        }
        debug!("finished filter '{}'", command.name());

        self.update_trace_location();
        self.current_context()
    }

    // ---------------------------------------------------------------------
    // Context pointers
    // ---------------------------------------------------------------------

    /// Push a view of the current context over `subject`.
    pub fn start_context_pointer(
        &mut self,
        ctx: &ScopeContext,
        subject: Value,
    ) -> ExecResult<ScopeContext> {
        self.test_current_context(ctx, "start_context_pointer")?;
        let view = ctx.relative(subject)?;
        self.contexts.push(view.clone());
        Ok(view)
    }

    pub fn stop_context_pointer(
        &mut self,
        ctx: &ScopeContext,
    ) -> ExecResult<ScopeContext> {
        self.test_current_pointer(ctx, "stop_context_pointer")?;
        self.pop_context()?.end();
        self.current_context()
    }

    pub fn suspend_context_pointer(
        &mut self,
        ctx: &ScopeContext,
    ) -> ExecResult<ScopeContext> {
        self.test_current_pointer(ctx, "suspend_context_pointer")?;
        let view = self.pop_context()?;
        self.suspended_contexts.push(view);
        self.current_context()
    }

    pub fn resume_context_pointer(
        &mut self,
        ctx: &ScopeContext,
    ) -> ExecResult<ScopeContext> {
        self.test_current_context(ctx, "resume_context_pointer")?;
        let top = self
            .suspended_contexts
            .last()
            .ok_or(ExecutionError::EmptyStack(StackKind::SuspendedContexts))?;
        if !top.is_pointer() {
            return Err(ExecutionError::NotAPointer {
                operation: "resume_context_pointer",
            });
        }
        let view = self.pop_suspended_context()?;
        self.contexts.push(view.clone());
        Ok(view)
    }

    // ---------------------------------------------------------------------
    // Exceptions
    // ---------------------------------------------------------------------

    /// Record that `command`'s body raised `fault`.
    ///
    /// The result lands on the parent frame: the same fault travels up
    /// unchanged, a new fault starts a fresh context, chained to the previous
    /// one unless a filter already handled it.
    pub fn exception_thrown(
        &mut self,
        command: &CommandRef,
        fault: &Fault,
    ) -> ExecResult<()> {
        self.test_current_command(command, "exception_thrown")?;
        let depth = self.frames.len();
        if depth < 2 {
            return Err(ExecutionError::EmptyStack(StackKind::Frames));
        }

        let context = match self.frames[depth - 1].exception.clone() {
            Some(existing) if existing.fault().same(fault) => existing,
            Some(existing) if !existing.is_handled() => {
                ExceptionContext::new(fault.clone(), self.trace_snapshot(), Some(existing))
            }
            _ => ExceptionContext::new(fault.clone(), self.trace_snapshot(), None),
        };
        debug!("'{}' raised: {}", command.name(), fault);
        self.frames[depth - 2].exception = Some(context);
        Ok(())
    }

    /// Mark the error recorded on `command`'s parent frame as handled.
    pub fn exception_handled(
        &mut self,
        command: &CommandRef,
        fault: &Fault,
    ) -> ExecResult<()> {
        self.test_current_command(command, "exception_handled")?;
        let depth = self.frames.len();
        let recorded = depth
            .checked_sub(2)
            .and_then(|parent| self.frames[parent].exception.as_ref())
            .ok_or_else(|| ExecutionError::MissingException {
                command: command.name().to_string(),
            })?;
        recorded.mark_handled();
        debug!("'{}' handled: {}", command.name(), fault);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------------

    pub fn in_execution(&self) -> bool {
        self.global.is_some()
    }

    /// Context created by `start_execution`.
    pub fn global_context(&self) -> Option<&ScopeContext> {
        self.global.as_ref()
    }

    /// Innermost pushed context, if any command boundary or pointer is active.
    pub fn local_context(&self) -> Option<&ScopeContext> {
        self.contexts.last()
    }

    /// Local context, or the global one outside any boundary.
    pub fn current_context(&self) -> ExecResult<ScopeContext> {
        self.contexts
            .last()
            .or(self.global.as_ref())
            .cloned()
            .ok_or(ExecutionError::NotRunning)
    }

    /// System id of the innermost registered command.
    pub fn system_id(&self) -> ExecResult<&str> {
        self.trace
            .last()
            .map(|entry| entry.system_id())
            .ok_or(ExecutionError::EmptyStack(StackKind::Trace))
    }

    /// Snapshot of the active trace, innermost first.
    pub fn execution_trace(&self) -> Vec<TraceElement> {
        self.trace_snapshot().into_vec()
    }

    /// Innermost live trace entry.
    pub fn current_trace(&self) -> Option<&Rc<TraceEntry>> {
        self.trace.last()
    }

    /// Innermost frame.
    pub fn current_frame(&self) -> Option<&InvocationFrame> {
        self.frames.last()
    }

    /// Error recorded on the global frame, if any.
    pub fn global_exception(&self) -> Option<&Rc<ExceptionContext>> {
        self.frames.first().and_then(|frame| frame.exception.as_ref())
    }

    /// Entries on one stack.
    pub fn depth(
        &self,
        stack: StackKind,
    ) -> usize {
        match stack {
            StackKind::Frames => self.frames.len(),
            StackKind::SuspendedFrames => self.suspended_frames.len(),
            StackKind::Trace => self.trace.len(),
            StackKind::SuspendedTrace => self.suspended_trace.len(),
            StackKind::Contexts => self.contexts.len(),
            StackKind::SuspendedContexts => self.suspended_contexts.len(),
            StackKind::Prefixes => self.prefixes.depth(),
        }
    }

    /// One-line dump of the stack depths.
    pub fn state_summary(&self) -> String {
        format!(
            "running={} frames={}/{} trace={}/{} contexts={}/{} prefixes={} top={:?}",
            self.in_execution(),
            self.frames.len(),
            self.suspended_frames.len(),
            self.trace.len(),
            self.suspended_trace.len(),
            self.contexts.len(),
            self.suspended_contexts.len(),
            self.prefixes.depth(),
            self.frames.last(),
        )
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn pop_context(&mut self) -> ExecResult<ScopeContext> {
        self.contexts.pop().ok_or(ExecutionError::EmptyStack(StackKind::Contexts))
    }

    fn pop_suspended_context(&mut self) -> ExecResult<ScopeContext> {
        self.suspended_contexts
            .pop()
            .ok_or(ExecutionError::EmptyStack(StackKind::SuspendedContexts))
    }

    fn trace_snapshot(&self) -> TraceSnapshot {
        self.trace.iter().rev().map(|entry| entry.snapshot()).collect()
    }

    fn update_trace_location(&self) {
        let Some(entry) = self.trace.last() else {
            return;
        };
        let Some(FrameKind::Command(command)) = self.frames.last().map(|frame| &frame.kind) else {
            return;
        };
        let locator = command
            .locator()
            .cloned()
            .unwrap_or_else(|| Locator::unknown(&self.settings.unknown_location));
        trace!("'{}' at {}", command.name(), locator);
        entry.set_locator(locator);
    }

    fn test_current_context(
        &self,
        ctx: &ScopeContext,
        operation: &'static str,
    ) -> ExecResult<()> {
        if self.current_context()?.ptr_eq(ctx) {
            Ok(())
        } else {
            Err(ExecutionError::ContextMismatch { operation })
        }
    }

    /// Current-context check that also requires a pointer view.
    fn test_current_pointer(
        &self,
        ctx: &ScopeContext,
        operation: &'static str,
    ) -> ExecResult<()> {
        self.test_current_context(ctx, operation)?;
        if ctx.is_pointer() {
            Ok(())
        } else {
            Err(ExecutionError::NotAPointer { operation })
        }
    }

    fn test_current_command(
        &self,
        command: &CommandRef,
        operation: &'static str,
    ) -> ExecResult<()> {
        let top = self.frames.last().ok_or(ExecutionError::EmptyStack(StackKind::Frames))?;
        if top.is_for(command) {
            Ok(())
        } else {
            Err(mismatch(operation, top, command))
        }
    }
}

fn mismatch(
    operation: &'static str,
    frame: &InvocationFrame,
    command: &CommandRef,
) -> ExecutionError {
    ExecutionError::CommandMismatch {
        operation,
        expected: frame
            .command()
            .map_or_else(|| "<global>".to_string(), |c| c.name().to_string()),
        found: command.name().to_string(),
    }
}

impl Drop for Execution {
    fn drop(&mut self) {
        if self.in_execution() {
            debug!("execution dropped while running; releasing contexts");
            let _ = self.end_execution();
        }
    }
}
