//! Scope lattice
//!
//! Scopes are the nesting levels that bound the lifetime of variables and
//! components. They are totally ordered from the outermost level inward.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Nesting level of a scope context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// The caller's request, outside of any run.
    Request,
    /// One run, from `start_execution` to `end_execution`.
    Execution,
    /// One registered (reusable) command unit.
    Chain,
}

impl Scope {
    /// All scopes, outermost first.
    pub const ALL: [Scope; 3] = [Scope::Request, Scope::Execution, Scope::Chain];

    /// The scope of a node created one boundary below this one.
    ///
    /// `Chain` is the innermost level, so chains nested in chains stay at `Chain`.
    pub fn child(self) -> Scope {
        match self {
            Scope::Request => Scope::Execution,
            Scope::Execution | Scope::Chain => Scope::Chain,
        }
    }

    /// Lower-case name used in diagnostics and configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Request => "request",
            Scope::Execution => "execution",
            Scope::Chain => "chain",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
