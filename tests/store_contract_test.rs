//! Store Contract Integration Tests
//!
//! Runs the shared backend contract against:
//! - The in-memory store
//! - The file store (JSON, and TOML with the `toml` feature)
//! - PostgreSQL, MySQL and Redis when their feature is enabled and a
//!   connection string is provided through the environment:
//!   `CONFSTORE_POSTGRES_URL`, `CONFSTORE_MYSQL_URL`, `CONFSTORE_REDIS_URL`

mod common;

use common::contract;
use confstore::store::{FileStore, MemoryStore};
use confstore::{ConfigStore, UpsertAtomicity};
use std::sync::Arc;

// =============================================================================
// Built-in Stores
// =============================================================================

#[tokio::test]
async fn test_memory_store_contract() {
    common::init_logging();
    let store = MemoryStore::new();
    contract::run_all(&store, &contract::namespace("memory")).await;
    assert_eq!(store.atomicity(), UpsertAtomicity::PerEntry);
}

#[tokio::test]
async fn test_file_store_contract() {
    common::init_logging();
    let fixture = common::FileFixture::new();
    contract::run_all(&fixture.store, &contract::namespace("file")).await;
    assert_eq!(fixture.store.atomicity(), UpsertAtomicity::Transactional);
    assert!(fixture.store.path().exists());
}

#[tokio::test]
async fn test_file_store_contract_survives_reopen() {
    let fixture = common::FileFixture::new();
    let ns = contract::namespace("reopen");
    contract::upsert_then_get(&fixture.store, &ns).await;

    let reopened = FileStore::new(fixture.store.path());
    let all = reopened.get_all(Some(&format!("{ns}-basic"))).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[cfg(feature = "toml")]
#[tokio::test]
async fn test_toml_file_store_contract() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::with_format(
        dir.path().join("settings.toml"),
        confstore::format::TomlFormat,
    );
    contract::run_all(&store, &contract::namespace("toml")).await;
}

#[tokio::test]
async fn test_shared_arc_store_contract() {
    let store: Arc<dyn ConfigStore> = Arc::new(MemoryStore::new());
    contract::run_all(&store, &contract::namespace("arc")).await;
    assert_eq!(store.backend_name(), "memory");
}

// =============================================================================
// Database Stores (opt-in through environment variables)
// =============================================================================

fn env_url(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(url) if !url.trim().is_empty() => Some(url),
        _ => {
            eprintln!("{name} not set, skipping");
            None
        }
    }
}

#[cfg(feature = "postgres")]
#[tokio::test]
async fn test_postgres_store_contract() {
    use confstore::store::{PostgresStore, PostgresStoreOptions};

    let Some(url) = env_url("CONFSTORE_POSTGRES_URL") else {
        return;
    };
    let options = PostgresStoreOptions::new(url)
        .table("configr_contract")
        .auto_create_table(true);
    let store = PostgresStore::connect(options).await.unwrap();

    contract::run_all(&store, &contract::namespace("pg")).await;
    assert_eq!(store.atomicity(), UpsertAtomicity::Transactional);
}

#[cfg(feature = "mysql")]
#[tokio::test]
async fn test_mysql_store_contract() {
    use confstore::store::{MySqlStore, MySqlStoreOptions};

    let Some(url) = env_url("CONFSTORE_MYSQL_URL") else {
        return;
    };
    let options = MySqlStoreOptions::new(url).table("configr_contract");
    let store = MySqlStore::connect(options).await.unwrap();

    contract::run_all(&store, &contract::namespace("mysql")).await;
    assert_eq!(store.atomicity(), UpsertAtomicity::PerEntry);
}

#[cfg(feature = "redis")]
#[tokio::test]
async fn test_redis_store_contract() {
    use confstore::store::{RedisStore, RedisStoreOptions};

    let Some(url) = env_url("CONFSTORE_REDIS_URL") else {
        return;
    };
    let options = RedisStoreOptions::new(url).key_prefix("configr_contract");
    let store = RedisStore::connect(options).await.unwrap();

    contract::run_all(&store, &contract::namespace("redis")).await;
    assert_eq!(store.atomicity(), UpsertAtomicity::PerScope);
}
