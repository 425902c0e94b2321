//! PostgreSQL store

use super::{
    ConfigStore, DEFAULT_TABLE_NAME, UpsertAtomicity, check_lookup, check_scope, prepare_upsert,
};
use crate::entry::{ConfigEntry, Entries};
use crate::error::{Error, Result};
use crate::security::{self, MAX_IDENTIFIER_LEN, MAX_KEY_LEN, MAX_SCOPE_LEN};
use async_trait::async_trait;
use log::{debug, info};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::OnceCell;

/// Connection and schema options for [`PostgresStore`]
#[derive(Debug, Clone)]
pub struct PostgresStoreOptions {
    pub connection_string: String,
    pub schema: String,
    pub table: String,
    /// Create the table and its unique index on first use
    pub auto_create_table: bool,
    pub max_connections: u32,
}

impl PostgresStoreOptions {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            schema: "public".into(),
            table: DEFAULT_TABLE_NAME.into(),
            auto_create_table: false,
            max_connections: 10,
        }
    }

    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
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
    /// Returns `Error::InvalidIdentifier` for a bad schema or table name and
    /// `Error::InvalidArgument` for an empty connection string or pool size.
    pub fn validate(&self) -> Result<()> {
        if self.connection_string.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "PostgreSQL connection string must be provided".into(),
            ));
        }
        if self.max_connections == 0 {
            return Err(Error::InvalidArgument(
                "max_connections must be greater than 0".into(),
            ));
        }
        security::validate_identifier("schema", &self.schema)?;
        security::validate_identifier("table", &self.table)
    }
}

/// Pre-built statements for one schema/table pair
#[derive(Debug)]
struct Statements {
    lock_key: String,
    create_schema: String,
    create_table: String,
    create_index: String,
    select_one: String,
    select_all: String,
    upsert: String,
}

impl Statements {
    /// Identifiers must already be validated; they are quoted, never bound.
    fn new(schema: &str, table: &str) -> Self {
        let qualified = format!("\"{schema}\".\"{table}\"");
        Self {
            lock_key: format!("{schema}.{table}"),
            create_schema: format!("CREATE SCHEMA IF NOT EXISTS \"{schema}\""),
            create_table: format!(
                "CREATE TABLE IF NOT EXISTS {qualified} (\
                 id BIGSERIAL PRIMARY KEY, \
                 key VARCHAR({MAX_KEY_LEN}) NOT NULL, \
                 value TEXT NOT NULL, \
                 scope VARCHAR({MAX_SCOPE_LEN}) NULL)"
            ),
            create_index: format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS \"{index}\" \
                 ON {qualified} (key, (COALESCE(scope, '')))",
                index = index_name(schema, table)
            ),
            select_one: format!(
                "SELECT key, value, scope FROM {qualified} \
                 WHERE key = $1 AND scope IS NOT DISTINCT FROM $2"
            ),
            select_all: format!(
                "SELECT key, value, scope FROM {qualified} WHERE scope IS NOT DISTINCT FROM $1"
            ),
            upsert: format!(
                "INSERT INTO {qualified} (key, value, scope) VALUES ($1, $2, $3) \
                 ON CONFLICT (key, (COALESCE(scope, ''))) DO UPDATE SET value = EXCLUDED.value"
            ),
        }
    }
}

type Row = (String, String, Option<String>);

fn into_entry((key, value, scope): Row) -> ConfigEntry {
    ConfigEntry::scoped(key, value, scope.as_deref())
}

/// Store backed by a PostgreSQL table.
///
/// Rows are `(id, key, value, scope)` with a unique index on
/// `(key, COALESCE(scope, ''))`. A batch upsert runs in one transaction and
/// is rolled back entirely if any entry fails.
pub struct PostgresStore {
    pool: PgPool,
    statements: Statements,
    auto_create_table: bool,
    table_ready: OnceCell<()>,
}

impl PostgresStore {
    /// Validate `options` and connect a new pool
    ///
    /// # Errors
    ///
    /// Returns a validation error before any connection attempt, or
    /// `Error::Database` if the pool cannot connect.
    pub async fn connect(options: PostgresStoreOptions) -> Result<Self> {
        options.validate()?;
        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .connect(&options.connection_string)
            .await?;
        Ok(Self::from_parts(pool, &options))
    }

    /// Validate `options` and create a pool that connects on first use
    ///
    /// # Errors
    ///
    /// Returns a validation error, or `Error::Database` if the connection
    /// string cannot be parsed.
    pub fn connect_lazy(options: PostgresStoreOptions) -> Result<Self> {
        options.validate()?;
        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .connect_lazy(&options.connection_string)?;
        Ok(Self::from_parts(pool, &options))
    }

    /// Use an existing pool; `options.connection_string` is ignored
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidIdentifier` for a bad schema or table name.
    pub fn with_pool(pool: PgPool, options: &PostgresStoreOptions) -> Result<Self> {
        security::validate_identifier("schema", &options.schema)?;
        security::validate_identifier("table", &options.table)?;
        Ok(Self::from_parts(pool, options))
    }

    fn from_parts(pool: PgPool, options: &PostgresStoreOptions) -> Self {
        Self {
            pool,
            statements: Statements::new(&options.schema, &options.table),
            auto_create_table: options.auto_create_table,
            table_ready: OnceCell::new(),
        }
    }

    /// The underlying connection pool
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_table(&self) -> Result<()> {
        if !self.auto_create_table {
            return Ok(());
        }

        self.table_ready
            .get_or_try_init(|| async {
                let mut tx = self.pool.begin().await?;
                // Serializes DDL across processes sharing the database
                sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
                    .bind(self.statements.lock_key.as_str())
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(&self.statements.create_schema)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(&self.statements.create_table)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(&self.statements.create_index)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;

                info!("Ensured PostgreSQL table {}", self.statements.lock_key);
                Ok::<(), Error>(())
            })
            .await
            .map(|_| ())
    }
}

impl std::fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStore")
            .field("table", &self.statements.lock_key)
            .field("auto_create_table", &self.auto_create_table)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ConfigStore for PostgresStore {
    async fn get(&self, key: &str, scope: Option<&str>) -> Result<Option<ConfigEntry>> {
        let scope = check_lookup(key, scope)?;
        self.ensure_table().await?;

        let row: Option<Row> = sqlx::query_as(&self.statements.select_one)
            .bind(key)
            .bind(scope)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(into_entry))
    }

    async fn get_all(&self, scope: Option<&str>) -> Result<Entries> {
        let scope = check_scope(scope)?;
        self.ensure_table().await?;

        let rows: Vec<Row> = sqlx::query_as(&self.statements.select_all)
            .bind(scope)
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

        // Dropping the transaction on an early return rolls it back
        let mut tx = self.pool.begin().await?;
        for entry in &batch {
            sqlx::query(&self.statements.upsert)
                .bind(entry.key())
                .bind(entry.value())
                .bind(entry.scope())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!("Upserted {} entries into PostgreSQL", batch.len());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    fn atomicity(&self) -> UpsertAtomicity {
        UpsertAtomicity::Transactional
    }
}

/// Name of the unique `(key, scope)` index, at most `MAX_IDENTIFIER_LEN` bytes.
///
/// PostgreSQL truncates longer names, so two long tables sharing a prefix
/// would collide. Those get a truncated name plus a hash of the full
/// `schema.table` instead.
fn index_name(schema: &str, table: &str) -> String {
    let plain = format!("ux_{table}_key_scope");
    if plain.len() <= MAX_IDENTIFIER_LEN {
        return plain;
    }

    // FNV-1a, stable across builds and platforms
    let hash = format!("{schema}.{table}")
        .bytes()
        .fold(0x811c_9dc5_u32, |h, b| (h ^ u32::from(b)).wrapping_mul(0x0100_0193));
    // "ux_" + prefix + "_" + 8 hex digits; identifiers are ASCII
    let prefix = &table[..MAX_IDENTIFIER_LEN - 12];
    format!("ux_{prefix}_{hash:08x}")
}
