//! In-process store

use super::{ConfigStore, UpsertAtomicity, check_lookup, check_scope, prepare_upsert};
use crate::entry::{ConfigEntry, Entries};
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;

type RowKey = (Option<String>, String);

/// Store backed by a concurrent map; contents live as long as the value.
///
/// Useful for tests and for embedding defaults. Entries are written one at a
/// time, so a racing `get_all` can observe a partially applied batch.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: DashMap<RowKey, ConfigEntry>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries across all scopes
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get(&self, key: &str, scope: Option<&str>) -> Result<Option<ConfigEntry>> {
        let scope = check_lookup(key, scope)?;
        let row_key = (scope.map(str::to_owned), key.to_string());
        Ok(self.rows.get(&row_key).map(|row| row.value().clone()))
    }

    async fn get_all(&self, scope: Option<&str>) -> Result<Entries> {
        let scope = check_scope(scope)?;
        Ok(self
            .rows
            .iter()
            .filter(|row| row.key().0.as_deref() == scope)
            .map(|row| (row.key().1.clone(), row.value().clone()))
            .collect())
    }

    async fn upsert(&self, entries: &[ConfigEntry], scope: Option<&str>) -> Result<()> {
        for entry in prepare_upsert(entries, scope)? {
            let row_key = (entry.scope().map(str::to_owned), entry.key().to_string());
            self.rows.insert(row_key, entry);
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn atomicity(&self) -> UpsertAtomicity {
        UpsertAtomicity::PerEntry
    }
}
