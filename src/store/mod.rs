//! Storage backends
//!
//! A [`ConfigStore`] persists [`ConfigEntry`] rows keyed by `(key, scope)`.
//! All backends share one contract:
//!
//! - a blank scope is the global scope, and the global scope only matches
//!   global rows (it is never a wildcard)
//! - `get` rejects a blank key; `upsert` silently skips blank keys
//! - the whole batch is validated before the first write
//! - existing rows are overwritten (last write wins)
//!
//! How much of a batch a concurrent reader can observe half-applied differs
//! per backend and is reported by [`ConfigStore::atomicity`].

use crate::entry::{ConfigEntry, Entries, normalize_scope};
use crate::error::Result;
use crate::security;
use async_trait::async_trait;
use log::warn;
use std::sync::Arc;

mod file;
mod memory;
#[cfg(feature = "mysql")]
mod mysql;
#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "redis")]
mod redis;

pub use file::FileStore;
pub use memory::MemoryStore;
#[cfg(feature = "mysql")]
pub use mysql::{MySqlStore, MySqlStoreOptions};
#[cfg(feature = "postgres")]
pub use postgres::{PostgresStore, PostgresStoreOptions};
#[cfg(feature = "redis")]
pub use self::redis::{RedisStore, RedisStoreOptions};

/// Default table / key prefix used by every backend
pub const DEFAULT_TABLE_NAME: &str = "configr";

/// How a backend applies a multi-entry upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAtomicity {
    /// The whole batch commits or rolls back as one unit
    Transactional,
    /// Entries of one scope are written atomically; scopes are independent
    PerScope,
    /// Entries are written one at a time. A failure mid-batch leaves earlier
    /// entries committed, and a concurrent reader may see some fields updated
    /// and others not.
    PerEntry,
}

/// Durable key/value storage for configuration entries
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Look up the entry for `(key, scope)`
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` for a blank key, or the backend's error.
    async fn get(&self, key: &str, scope: Option<&str>) -> Result<Option<ConfigEntry>>;

    /// Every entry stored under `scope`, keyed by entry key
    ///
    /// # Errors
    ///
    /// Returns the backend's error.
    async fn get_all(&self, scope: Option<&str>) -> Result<Entries>;

    /// Insert or overwrite `entries`.
    ///
    /// `scope` overrides the scope carried by each entry; when it is `None`
    /// every entry keeps its own scope.
    ///
    /// # Errors
    ///
    /// Returns a validation error (before anything is written) or the
    /// backend's error.
    async fn upsert(&self, entries: &[ConfigEntry], scope: Option<&str>) -> Result<()>;

    /// Short backend name for logs and diagnostics
    fn backend_name(&self) -> &'static str;

    /// Batch semantics of [`upsert`](Self::upsert)
    fn atomicity(&self) -> UpsertAtomicity;
}

/// Lets several managers share one store instance
#[async_trait]
impl<S: ConfigStore + ?Sized> ConfigStore for Arc<S> {
    async fn get(&self, key: &str, scope: Option<&str>) -> Result<Option<ConfigEntry>> {
        (**self).get(key, scope).await
    }

    async fn get_all(&self, scope: Option<&str>) -> Result<Entries> {
        (**self).get_all(scope).await
    }

    async fn upsert(&self, entries: &[ConfigEntry], scope: Option<&str>) -> Result<()> {
        (**self).upsert(entries, scope).await
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }

    fn atomicity(&self) -> UpsertAtomicity {
        (**self).atomicity()
    }
}

/// Normalize and validate the arguments of a `get`
pub(crate) fn check_lookup<'a>(key: &str, scope: Option<&'a str>) -> Result<Option<&'a str>> {
    security::validate_key(key)?;
    let scope = normalize_scope(scope);
    security::validate_scope(scope)?;
    Ok(scope)
}

/// Normalize and validate a scope passed to `get_all`
pub(crate) fn check_scope(scope: Option<&str>) -> Result<Option<&str>> {
    let scope = normalize_scope(scope);
    security::validate_scope(scope)?;
    Ok(scope)
}

/// Resolve each entry's effective scope, drop blank keys and validate the rest.
///
/// Nothing is returned unless every remaining entry passes validation.
pub(crate) fn prepare_upsert(
    entries: &[ConfigEntry],
    scope: Option<&str>,
) -> Result<Vec<ConfigEntry>> {
    let scope = normalize_scope(scope);
    let mut batch = Vec::with_capacity(entries.len());

    for entry in entries {
        if entry.key().trim().is_empty() {
            warn!("Skipping configuration entry with a blank key");
            continue;
        }

        let effective = scope.or_else(|| entry.scope());
        security::validate_entry(entry, effective)?;
        batch.push(ConfigEntry::scoped(entry.key(), entry.value(), effective));
    }

    Ok(batch)
}

/// Group a prepared batch by scope, preserving first-seen scope order
#[cfg_attr(not(feature = "redis"), allow(dead_code))]
pub(crate) fn group_by_scope(batch: Vec<ConfigEntry>) -> Vec<(Option<String>, Vec<ConfigEntry>)> {
    let mut groups: Vec<(Option<String>, Vec<ConfigEntry>)> = Vec::new();
    for entry in batch {
        let scope = entry.scope().map(str::to_owned);
        match groups.iter_mut().find(|(s, _)| *s == scope) {
            Some((_, group)) => group.push(entry),
            None => groups.push((scope, vec![entry])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_blank_keys_are_skipped() {
        let entries = vec![
            ConfigEntry::new("a.one", "1"),
            ConfigEntry::new("   ", "2"),
            ConfigEntry::new("", "3"),
        ];
        let batch = prepare_upsert(&entries, None).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].key(), "a.one");
    }

    #[test]
    fn test_method_scope_overrides_entry_scope() {
        let entries = vec![
            ConfigEntry::scoped("a", "1", Some("entry-scope")),
            ConfigEntry::new("b", "2"),
        ];

        let batch = prepare_upsert(&entries, Some("call-scope")).unwrap();
        assert!(batch.iter().all(|e| e.scope() == Some("call-scope")));

        let batch = prepare_upsert(&entries, Some("  ")).unwrap();
        assert_eq!(batch[0].scope(), Some("entry-scope"));
        assert_eq!(batch[1].scope(), None);
    }

    #[test]
    fn test_one_invalid_entry_rejects_batch() {
        let entries = vec![
            ConfigEntry::new("ok", "1"),
            ConfigEntry::new("k".repeat(security::MAX_KEY_LEN + 1), "2"),
        ];
        let err = prepare_upsert(&entries, None).unwrap_err();
        assert!(matches!(err, Error::LimitExceeded { what: "key", .. }));
    }

    #[test]
    fn test_check_lookup() {
        assert!(matches!(
            check_lookup(" ", None),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(check_lookup("k", Some("")).unwrap(), None);
        assert_eq!(check_lookup("k", Some("s")).unwrap(), Some("s"));
    }

    #[test]
    fn test_group_by_scope() {
        let batch = vec![
            ConfigEntry::scoped("a", "1", Some("x")),
            ConfigEntry::new("b", "2"),
            ConfigEntry::scoped("c", "3", Some("x")),
        ];
        let groups = group_by_scope(batch);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0.as_deref(), Some("x"));
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, None);
    }
}
