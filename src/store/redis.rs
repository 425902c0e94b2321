//! Redis store

use super::{
    ConfigStore, DEFAULT_TABLE_NAME, UpsertAtomicity, check_lookup, check_scope, group_by_scope,
    prepare_upsert,
};
use crate::entry::{ConfigEntry, Entries};
use crate::error::{Error, Result};
use crate::security;
use async_trait::async_trait;
use log::debug;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;

/// Connection options for [`RedisStore`]
#[derive(Debug, Clone)]
pub struct RedisStoreOptions {
    pub connection_string: String,
    /// First segment of every hash name
    pub key_prefix: String,
}

impl RedisStoreOptions {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            key_prefix: DEFAULT_TABLE_NAME.into(),
        }
    }

    #[must_use]
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Check the options without touching the network
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidIdentifier` for a bad key prefix and
    /// `Error::InvalidArgument` for an empty connection string.
    pub fn validate(&self) -> Result<()> {
        if self.connection_string.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "Redis connection string must be provided".into(),
            ));
        }
        security::validate_identifier("key prefix", &self.key_prefix)
    }
}

/// Store keeping one Redis hash per scope.
///
/// The global scope lives in `{prefix}:global` and scope `s` in
/// `{prefix}:scope:{s}`, so no scope name can collide with the global hash.
/// All entries of one scope are written by a single `HSET`.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    key_prefix: String,
}

impl RedisStore {
    /// Validate `options` and open a managed connection
    ///
    /// # Errors
    ///
    /// Returns a validation error before any connection attempt, or
    /// `Error::Redis` if the server cannot be reached.
    pub async fn connect(options: RedisStoreOptions) -> Result<Self> {
        options.validate()?;
        let client = redis::Client::open(options.connection_string.as_str())?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self {
            connection,
            key_prefix: options.key_prefix,
        })
    }

    /// Use an existing connection manager
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidIdentifier` for a bad key prefix.
    pub fn with_connection(connection: ConnectionManager, key_prefix: &str) -> Result<Self> {
        security::validate_identifier("key prefix", key_prefix)?;
        Ok(Self {
            connection,
            key_prefix: key_prefix.to_string(),
        })
    }

    fn hash_name(&self, scope: Option<&str>) -> String {
        hash_name(&self.key_prefix, scope)
    }
}

fn hash_name(prefix: &str, scope: Option<&str>) -> String {
    match scope {
        Some(scope) => format!("{prefix}:scope:{scope}"),
        None => format!("{prefix}:global"),
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ConfigStore for RedisStore {
    async fn get(&self, key: &str, scope: Option<&str>) -> Result<Option<ConfigEntry>> {
        let scope = check_lookup(key, scope)?;
        let mut conn = self.connection.clone();

        let value: Option<String> = conn.hget(self.hash_name(scope), key).await?;
        Ok(value.map(|value| ConfigEntry::scoped(key, value, scope)))
    }

    async fn get_all(&self, scope: Option<&str>) -> Result<Entries> {
        let scope = check_scope(scope)?;
        let mut conn = self.connection.clone();

        let fields: HashMap<String, String> = conn.hgetall(self.hash_name(scope)).await?;
        Ok(fields
            .into_iter()
            .map(|(key, value)| {
                let entry = ConfigEntry::scoped(key.clone(), value, scope);
                (key, entry)
            })
            .collect())
    }

    async fn upsert(&self, entries: &[ConfigEntry], scope: Option<&str>) -> Result<()> {
        let batch = prepare_upsert(entries, scope)?;
        if batch.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection.clone();
        for (scope, group) in group_by_scope(batch) {
            let items: Vec<(String, String)> = group
                .into_iter()
                .map(|e| (e.key().to_string(), e.value().to_string()))
                .collect();
            let hash = self.hash_name(scope.as_deref());
            let () = conn.hset_multiple(&hash, &items).await?;
            debug!("Wrote {} fields to Redis hash {hash}", items.len());
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }

    fn atomicity(&self) -> UpsertAtomicity {
        UpsertAtomicity::PerScope
    }
}
