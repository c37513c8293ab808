//! Command metadata consumed by the stack machine
//!
//! The machine never runs command bodies itself. It only needs to know, per
//! command: whether it is a filter, whether it is a registered unit (and so a
//! scope boundary), where it came from, and which prefixes it rebinds.

use crate::runtime::qname::QName;
use crate::vm::frames::Locator;
use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;

/// Shared command handle; the stack machine compares these by identity.
pub type CommandRef = Rc<dyn Command>;

/// How a command's frame is treated when its body ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandKind {
    /// Frame is released when the body ends.
    #[default]
    Plain,
    /// Frame is suspended until its post-processing runs.
    Filter,
}

/// Identity of a command registered as a reusable named unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub system_id: String,
    pub qname: QName,
}

/// A unit of work driven through the stack machine.
pub trait Command {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    fn kind(&self) -> CommandKind {
        CommandKind::Plain
    }

    /// `Some` when the command is a registered unit; such commands open a new
    /// scope context and trace entry.
    fn registration(&self) -> Option<&Registration> {
        None
    }

    /// Source position, if known.
    fn locator(&self) -> Option<&Locator> {
        None
    }

    /// Prefix bindings in force while the command runs; `None` when the
    /// command declares none.
    fn prefix_mappings(&self) -> Option<&IndexMap<String, String>> {
        None
    }

    fn is_filter(&self) -> bool {
        self.kind() == CommandKind::Filter
    }

    fn is_boundary(&self) -> bool {
        self.registration().is_some()
    }
}

/// Plain data implementation of [`Command`].
#[derive(Debug, Clone, Default)]
pub struct BasicCommand {
    name: String,
    kind: CommandKind,
    registration: Option<Registration>,
    locator: Option<Locator>,
    prefix_mappings: Option<IndexMap<String, String>>,
}

impl BasicCommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn filter(mut self) -> Self {
        self.kind = CommandKind::Filter;
        self
    }

    /// Register as a named unit loaded from `system_id`.
    pub fn registered(
        mut self,
        system_id: impl Into<String>,
        qname: QName,
    ) -> Self {
        self.registration = Some(Registration {
            system_id: system_id.into(),
            qname,
        });
        self
    }

    pub fn located(
        mut self,
        locator: Locator,
    ) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn prefix(
        mut self,
        prefix: &str,
        uri: &str,
    ) -> Self {
        self.prefix_mappings
            .get_or_insert_with(IndexMap::new)
            .insert(prefix.to_string(), uri.to_string());
        self
    }

    pub fn shared(self) -> CommandRef {
        Rc::new(self)
    }
}

impl Command for BasicCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> CommandKind {
        self.kind
    }

    fn registration(&self) -> Option<&Registration> {
        self.registration.as_ref()
    }

    fn locator(&self) -> Option<&Locator> {
        self.locator.as_ref()
    }

    fn prefix_mappings(&self) -> Option<&IndexMap<String, String>> {
        self.prefix_mappings.as_ref()
    }
}

impl fmt::Display for BasicCommand {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match &self.registration {
            Some(registration) => write!(f, "{} ({})", self.name, registration.qname),
            None => f.write_str(&self.name),
        }
    }
}
