//! The page/document hosting the avatar widget.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("failed to create host element `{id}`: {reason}")]
    Placeholder { id: String, reason: String },
}

#[cfg_attr(test, mockall::automock)]
pub trait HostDocument {
    /// Hostname the front end is served from.
    fn hostname(&self) -> String;

    fn has_element(&self, id: &str) -> bool;

    /// Creates an empty element with `id` for the widget to mount into.
    fn insert_placeholder(&self, id: &str) -> Result<(), HostError>;
}

/// In-memory host document.
#[derive(Debug, Default)]
pub struct StaticHost {
    hostname: String,
    elements: Mutex<HashSet<String>>,
}

impl StaticHost {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            elements: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_element(self, id: &str) -> Self {
        self.elements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string());
        self
    }
}

impl HostDocument for StaticHost {
    fn hostname(&self) -> String {
        self.hostname.clone()
    }

    fn has_element(&self, id: &str) -> bool {
        self.elements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    fn insert_placeholder(&self, id: &str) -> Result<(), HostError> {
        self.elements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string());
        Ok(())
    }
}

/// `pattern` starting with a dot matches any subdomain; otherwise the
/// hostname must equal it or end in `.pattern`.
pub fn hostname_matches(hostname: &str, pattern: &str) -> bool {
    let hostname = hostname.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();
    if pattern.starts_with('.') {
        hostname.ends_with(&pattern)
    } else {
        hostname == pattern || hostname.ends_with(&format!(".{}", pattern))
    }
}
