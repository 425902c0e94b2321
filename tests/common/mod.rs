//! Common test utilities for confstore integration tests
//!
//! Provides shared configuration types, store fixtures, and helper functions.

#![allow(dead_code)]

pub mod contract;

use confstore::store::{FileStore, MemoryStore};
use confstore::{ConfigManager, ConfigStore, DeriveConfigType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use time::OffsetDateTime;

// =============================================================================
// Test Configuration Types
// =============================================================================

/// A configuration type covering every value kind
#[derive(Debug, Clone, PartialEq, Default, DeriveConfigType)]
pub struct SampleConfig {
    pub name: String,
    pub count: i32,
    pub enabled: bool,
    pub ratio: f64,
    pub tags: Vec<String>,
    pub limits: Limits,
    pub labels: HashMap<String, String>,
    pub nickname: Option<String>,
    pub retries: Option<u8>,
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Limits {
    pub max_items: u32,
    pub max_total: f64,
}

impl SampleConfig {
    pub fn populated() -> Self {
        Self {
            name: "Leanwork".to_string(),
            count: 42,
            enabled: true,
            ratio: 0.75,
            tags: vec!["alpha".to_string(), "beta".to_string()],
            limits: Limits {
                max_items: 25,
                max_total: 1999.5,
            },
            labels: HashMap::from([("region".to_string(), "eu".to_string())]),
            nickname: Some("lw".to_string()),
            retries: Some(3),
            updated_at: Some(time::macros::datetime!(2024-05-01 12:30:00 UTC)),
        }
    }
}

/// The checkout example from the documentation
#[derive(Debug, Clone, PartialEq, Default, DeriveConfigType)]
pub struct CheckoutConfig {
    pub login_required: bool,
    pub max_items: u32,
    pub banner: Option<String>,
}

/// Two unrelated types that share a `Name` field under different type names
#[derive(Debug, Clone, PartialEq, Default, DeriveConfigType)]
pub struct StoreProfile {
    pub name: String,
    pub currency: String,
}

/// Reads a subset of `StoreProfile`'s entries
#[derive(Debug, Clone, PartialEq, Default, DeriveConfigType)]
#[config(name = "StoreProfile")]
pub struct StoreProfileName {
    pub name: String,
}

/// Only runtime state; nothing to bind
#[derive(Debug, Clone, PartialEq, Default, DeriveConfigType)]
pub struct RuntimeOnly {
    #[config(skip)]
    pub handle: usize,
}

// =============================================================================
// Fixtures
// =============================================================================

/// Temporary directory plus a file store inside it
pub struct FileFixture {
    pub temp_dir: TempDir,
    pub store: FileStore,
}

impl FileFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = FileStore::new(temp_dir.path().join("config").join("settings.json"));
        Self { temp_dir, store }
    }
}

/// A manager over a fresh in-memory store, with the store kept for inspection
pub fn memory_manager() -> (Arc<MemoryStore>, ConfigManager) {
    let store = Arc::new(MemoryStore::new());
    let manager = ConfigManager::builder(Arc::clone(&store))
        .build()
        .expect("Failed to build manager");
    (store, manager)
}

/// Raw value of `key` in `scope`, straight from the store
pub async fn raw_value(store: &dyn ConfigStore, key: &str, scope: Option<&str>) -> Option<String> {
    store
        .get(key, scope)
        .await
        .expect("store lookup failed")
        .map(|entry| entry.value().to_string())
}

/// Route `log` output to the test harness (`RUST_LOG=debug` to see it)
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
