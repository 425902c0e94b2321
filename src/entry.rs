//! Configuration entries and scope handling

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Entries of one scope, keyed by entry key
pub type Entries = HashMap<String, ConfigEntry>;

/// Immutable, shareable view of every entry of one scope
pub type Snapshot = Arc<Entries>;

/// One configuration field at a point in time: `(key, value, scope)`.
///
/// Entries are immutable; an update replaces the whole entry. Uniqueness is
/// per `(key, scope)` pair, and a global entry (no scope) is distinct from
/// every scoped entry with the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    key: String,
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

impl ConfigEntry {
    /// Create a global (unscoped) entry
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            scope: None,
        }
    }

    /// Create an entry in the given scope. A blank scope means global.
    pub fn scoped(key: impl Into<String>, value: impl Into<String>, scope: Option<&str>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            scope: normalize_scope(scope).map(str::to_owned),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Copy of this entry re-homed under another key (used when normalizing snapshots)
    #[must_use]
    pub(crate) fn with_key(&self, key: String) -> Self {
        Self {
            key,
            value: self.value.clone(),
            scope: self.scope.clone(),
        }
    }
}

/// Treat empty and whitespace-only scopes as "no scope".
#[must_use]
pub fn normalize_scope(scope: Option<&str>) -> Option<&str> {
    scope.filter(|s| !s.trim().is_empty())
}
