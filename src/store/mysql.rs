//! MySQL store

use super::{
    ConfigStore, DEFAULT_TABLE_NAME, UpsertAtomicity, check_lookup, check_scope, prepare_upsert,
};
use crate::entry::{ConfigEntry, Entries};
use crate::error::{Error, Result};
use crate::security::{self, MAX_KEY_LEN, MAX_SCOPE_LEN};
use async_trait::async_trait;
use log::{debug, info};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use tokio::sync::OnceCell;

/// Connection and table options for [`MySqlStore`]
#[derive(Debug, Clone)]
pub struct MySqlStoreOptions {
    pub connection_string: String,
    pub table: String,
    /// Create the table on first use (on by default)
    pub auto_create_table: bool,
    pub max_connections: u32,
}

impl MySqlStoreOptions {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            table: DEFAULT_TABLE_NAME.into(),
            auto_create_table: true,
            max_connections: 10,
        }
    }

    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    #[must_use]
    pub fn auto_create_table(mut self, enabled: bool) -> Self {
        self.auto_create_table = enabled;
        self
    }

    #[must_use]
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Check the options without touching the network
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidIdentifier` for a bad table name and
    /// `Error::InvalidArgument` for an empty connection string or pool size.
    pub fn validate(&self) -> Result<()> {
        if self.connection_string.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "MySQL connection string must be provided".into(),
            ));
        }
        if self.max_connections == 0 {
            return Err(Error::InvalidArgument(
                "max_connections must be greater than 0".into(),
            ));
        }
        security::validate_identifier("table", &self.table)
    }
}

#[derive(Debug)]
struct Statements {
    table: String,
    create_table: String,
    select_one: String,
    select_all: String,
    upsert: String,
}

impl Statements {
    /// `scope_key` mirrors `scope` with NULL folded to '' so the unique key
    /// treats the global scope as one partition.
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            create_table: format!(
                "CREATE TABLE IF NOT EXISTS `{table}` (\
                 id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY, \
                 cfg_key VARCHAR({MAX_KEY_LEN}) NOT NULL, \
                 cfg_value LONGTEXT NOT NULL, \
                 scope VARCHAR({MAX_SCOPE_LEN}) NULL, \
                 scope_key VARCHAR({MAX_SCOPE_LEN}) GENERATED ALWAYS AS (COALESCE(scope, '')) STORED NOT NULL, \
                 UNIQUE KEY uk_configr_key_scope (cfg_key, scope_key)\
                 ) DEFAULT CHARSET = utf8mb4 COLLATE = utf8mb4_bin"
            ),
            select_one: format!(
                "SELECT cfg_key, cfg_value, scope FROM `{table}` WHERE cfg_key = ? AND scope_key = ?"
            ),
            select_all: format!(
                "SELECT cfg_key, cfg_value, scope FROM `{table}` WHERE scope_key = ?"
            ),
            upsert: format!(
                "INSERT INTO `{table}` (cfg_key, cfg_value, scope) VALUES (?, ?, ?) \
                 ON DUPLICATE KEY UPDATE cfg_value = VALUES(cfg_value)"
            ),
        }
    }
}

type Row = (String, String, Option<String>);

fn into_entry((key, value, scope): Row) -> ConfigEntry {
    ConfigEntry::scoped(key, value, scope.as_deref())
}

/// Store backed by a MySQL table.
///
/// Each entry of a batch is its own statement with no wrapping transaction:
/// a failure part-way leaves earlier entries written, and a concurrent
/// reader can observe a partially applied save.
pub struct MySqlStore {
    pool: MySqlPool,
    statements: Statements,
    auto_create_table: bool,
    table_ready: OnceCell<()>,
}

impl MySqlStore {
    /// Validate `options` and connect a new pool
    ///
    /// # Errors
    ///
    /// Returns a validation error before any connection attempt, or
    /// `Error::Database` if the pool cannot connect.
    pub async fn connect(options: MySqlStoreOptions) -> Result<Self> {
        options.validate()?;
        let pool = MySqlPoolOptions::new()
            .max_connections(options.max_connections)
            .connect(&options.connection_string)
            .await?;
        Ok(Self::from_parts(pool, &options))
    }

    /// Use an existing pool; `options.connection_string` is ignored
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidIdentifier` for a bad table name.
    pub fn with_pool(pool: MySqlPool, options: &MySqlStoreOptions) -> Result<Self> {
        security::validate_identifier("table", &options.table)?;
        Ok(Self::from_parts(pool, options))
    }

    fn from_parts(pool: MySqlPool, options: &MySqlStoreOptions) -> Self {
        Self {
            pool,
            statements: Statements::new(&options.table),
            auto_create_table: options.auto_create_table,
            table_ready: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn ensure_table(&self) -> Result<()> {
        if !self.auto_create_table {
            return Ok(());
        }

        self.table_ready
            .get_or_try_init(|| async {
                sqlx::query(&self.statements.create_table)
                    .execute(&self.pool)
                    .await?;
                info!("Ensured MySQL table {}", self.statements.table);
                Ok::<(), Error>(())
            })
            .await
            .map(|_| ())
    }
}

impl std::fmt::Debug for MySqlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlStore")
            .field("table", &self.statements.table)
            .field("auto_create_table", &self.auto_create_table)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ConfigStore for MySqlStore {
    async fn get(&self, key: &str, scope: Option<&str>) -> Result<Option<ConfigEntry>> {
        let scope = check_lookup(key, scope)?;
        self.ensure_table().await?;

        let row: Option<Row> = sqlx::query_as(&self.statements.select_one)
            .bind(key)
            .bind(scope.unwrap_or_default())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(into_entry))
    }

    async fn get_all(&self, scope: Option<&str>) -> Result<Entries> {
        let scope = check_scope(scope)?;
        self.ensure_table().await?;

        let rows: Vec<Row> = sqlx::query_as(&self.statements.select_all)
            .bind(scope.unwrap_or_default())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(into_entry)
            .map(|e| (e.key().to_string(), e))
            .collect())
    }

    async fn upsert(&self, entries: &[ConfigEntry], scope: Option<&str>) -> Result<()> {
        let batch = prepare_upsert(entries, scope)?;
        if batch.is_empty() {
            return Ok(());
        }
        self.ensure_table().await?;

        for entry in &batch {
            sqlx::query(&self.statements.upsert)
                .bind(entry.key())
                .bind(entry.value())
                .bind(entry.scope())
                .execute(&self.pool)
                .await?;
        }

        debug!("Upserted {} entries into MySQL", batch.len());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "mysql"
    }

    fn atomicity(&self) -> UpsertAtomicity {
        UpsertAtomicity::PerEntry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options = MySqlStoreOptions::new("mysql://localhost/db");
        assert_eq!(options.table, "configr");
        assert!(options.auto_create_table);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_identifier_validation() {
        for table in ["_ConfigR", "ConfigR123"] {
            assert!(MySqlStoreOptions::new("mysql://h/db").table(table).validate().is_ok());
        }
        for table in ["'; DROP TABLE ConfigR; --", "Config`R", "ConfigR;"] {
            let err = MySqlStoreOptions::new("mysql://h/db")
                .table(table)
                .validate()
                .unwrap_err();
            assert!(err.to_string().contains("Invalid identifier"), "{table}");
        }
    }

    #[test]
    fn test_empty_connection_string_rejected() {
        assert!(matches!(
            MySqlStoreOptions::new("  ").validate(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_statements_use_backticks() {
        let statements = Statements::new("ConfigR");
        assert!(statements.upsert.starts_with("INSERT INTO `ConfigR`"));
        assert!(statements.create_table.contains("COALESCE(scope, '')"));
    }
}
