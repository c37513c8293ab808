//! Invocation frames, trace elements and exception contexts

use crate::runtime::qname::QName;
use crate::vm::command::{CommandRef, Registration};
use crate::vm::fault::Fault;
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Source position of a command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    pub system_id: String,
    pub line: u32,
    pub column: u32,
}

impl Locator {
    pub fn new(
        system_id: impl Into<String>,
        line: u32,
        column: u32,
    ) -> Self {
        Self {
            system_id: system_id.into(),
            line,
            column,
        }
    }

    /// Position used when a command carries no locator.
    pub fn unknown(sentinel: &str) -> Self {
        Self::new(sentinel, 0, 0)
    }
}

impl fmt::Display for Locator {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}:{}", self.system_id, self.line, self.column)
    }
}

/// Snapshot of one trace entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceElement {
    pub system_id: Option<String>,
    pub qname: Option<QName>,
    pub locator: Option<Locator>,
}

impl fmt::Display for TraceElement {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match &self.locator {
            Some(locator) => write!(f, "{}", locator),
            None => write!(
                f,
                "{}:{}",
                self.system_id.as_deref().unwrap_or("null"),
                self.qname.as_ref().map(|q| q.to_string()).unwrap_or_else(|| "null".to_string())
            ),
        }
    }
}

/// Live trace entry of one entered scope boundary; its location moves as
/// commands inside the boundary start and end.
#[derive(Debug)]
pub struct TraceEntry {
    system_id: String,
    qname: QName,
    locator: RefCell<Option<Locator>>,
}

impl TraceEntry {
    pub(crate) fn new(registration: &Registration) -> Rc<Self> {
        Rc::new(Self {
            system_id: registration.system_id.clone(),
            qname: registration.qname.clone(),
            locator: RefCell::new(None),
        })
    }

    pub fn system_id(&self) -> &str {
        &self.system_id
    }

    pub fn qname(&self) -> &QName {
        &self.qname
    }

    pub fn locator(&self) -> Option<Locator> {
        self.locator.borrow().clone()
    }

    pub(crate) fn set_locator(
        &self,
        locator: Locator,
    ) {
        *self.locator.borrow_mut() = Some(locator);
    }

    pub fn snapshot(&self) -> TraceElement {
        TraceElement {
            system_id: Some(self.system_id.clone()),
            qname: Some(self.qname.clone()),
            locator: self.locator(),
        }
    }
}

pub(crate) type TraceSnapshot = SmallVec<[TraceElement; 4]>;

/// One raised error as recorded while unwinding, linked to the error it
/// interrupted.
pub struct ExceptionContext {
    fault: Fault,
    trace: TraceSnapshot,
    cause: Option<Rc<ExceptionContext>>,
    handled: Cell<bool>,
}

impl ExceptionContext {
    pub(crate) fn new(
        fault: Fault,
        trace: TraceSnapshot,
        cause: Option<Rc<ExceptionContext>>,
    ) -> Rc<Self> {
        Rc::new(Self {
            fault,
            trace,
            cause,
            handled: Cell::new(false),
        })
    }

    pub fn fault(&self) -> &Fault {
        &self.fault
    }

    /// Trace active when the context was created, innermost first.
    pub fn trace(&self) -> &[TraceElement] {
        &self.trace
    }

    pub fn cause(&self) -> Option<&Rc<ExceptionContext>> {
        self.cause.as_ref()
    }

    pub fn is_handled(&self) -> bool {
        self.handled.get()
    }

    pub(crate) fn mark_handled(&self) {
        self.handled.set(true);
    }

    /// This context followed by its causes.
    pub fn chain(&self) -> impl Iterator<Item = &ExceptionContext> {
        std::iter::successors(Some(self), |ctx| ctx.cause.as_deref())
    }
}

impl fmt::Debug for ExceptionContext {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ExceptionContext")
            .field("fault", &self.fault)
            .field("trace", &self.trace)
            .field("handled", &self.handled.get())
            .field("has_cause", &self.cause.is_some())
            .finish()
    }
}

/// Frame kind
#[derive(Clone)]
pub enum FrameKind {
    Global,
    Command(CommandRef),
}

/// Activation record for the run or one in-flight command.
pub struct InvocationFrame {
    pub(crate) kind: FrameKind,
    pub(crate) exception: Option<Rc<ExceptionContext>>,
}

impl InvocationFrame {
    pub(crate) fn global() -> Self {
        Self {
            kind: FrameKind::Global,
            exception: None,
        }
    }

    pub(crate) fn for_command(command: &CommandRef) -> Self {
        Self {
            kind: FrameKind::Command(Rc::clone(command)),
            exception: None,
        }
    }

    pub fn kind(&self) -> &FrameKind {
        &self.kind
    }

    pub fn command(&self) -> Option<&CommandRef> {
        match &self.kind {
            FrameKind::Global => None,
            FrameKind::Command(command) => Some(command),
        }
    }

    pub fn exception(&self) -> Option<&Rc<ExceptionContext>> {
        self.exception.as_ref()
    }

    /// Whether this frame runs `command` (handle identity).
    pub fn is_for(
        &self,
        command: &CommandRef,
    ) -> bool {
        self.command()
            .is_some_and(|own| std::ptr::addr_eq(Rc::as_ptr(own), Rc::as_ptr(command)))
    }
}

impl fmt::Debug for InvocationFrame {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match &self.kind {
            FrameKind::Global => write!(f, "Global"),
            FrameKind::Command(command) => write!(f, "Command[{}]", command.name()),
        }
    }
}
