//! Qualified names
//!
//! Variables, components and functions are identified by a (namespace, local-name)
//! pair. Textual names come in three forms:
//!
//! ```text
//! {uri}local-name     explicit namespace uri
//! prefix:local-name   prefix resolved against the active namespace bindings
//! local-name          no namespace
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use thiserror::Error;

static URI_LOCAL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{([^{]*)\}(.+)$").expect("valid qname pattern"));
static PREFIX_LOCAL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^:]*):([^:]+)$").expect("valid qname pattern"));
static LOCAL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^:]+)$").expect("valid qname pattern"));

/// Qualified name parse errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QNameError {
    #[error("could not find uri for prefix '{0}'")]
    UnknownPrefix(String),

    #[error("could not parse the qname '{0}'")]
    Malformed(String),
}

/// A (namespace, local-name) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    namespace: Option<String>,
    local: String,
}

impl QName {
    /// Name in the given namespace.
    pub fn new(
        namespace: impl Into<String>,
        local: impl Into<String>,
    ) -> Self {
        let namespace = namespace.into();
        Self {
            namespace: if namespace.is_empty() {
                None
            } else {
                Some(namespace)
            },
            local: local.into(),
        }
    }

    /// Name without a namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local: local.into(),
        }
    }

    /// Parse a textual name, resolving a prefix with `resolve`.
    pub fn parse<F>(
        text: &str,
        resolve: F,
    ) -> Result<Self, QNameError>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        if let Some(caps) = URI_LOCAL_NAME.captures(text) {
            return Ok(QName::new(&caps[1], &caps[2]));
        }

        if let Some(caps) = PREFIX_LOCAL_NAME.captures(text) {
            let prefix = &caps[1];
            let uri = resolve(prefix).ok_or_else(|| QNameError::UnknownPrefix(prefix.to_string()))?;
            return Ok(QName::new(uri, &caps[2]));
        }

        if let Some(caps) = LOCAL_NAME.captures(text) {
            return Ok(QName::local(&caps[1]));
        }

        Err(QNameError::Malformed(text.to_string()))
    }

    /// Namespace uri, `None` for the null namespace.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Local part.
    pub fn local_name(&self) -> &str {
        &self.local
    }
}

impl fmt::Display for QName {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match &self.namespace {
            Some(uri) => write!(f, "{{{}}}{}", uri, self.local),
            None => f.write_str(&self.local),
        }
    }
}
