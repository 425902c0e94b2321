//! # confstore - Typed Configuration over Key/Value Stores
//!
//! Bind plain Rust structs to individually keyed configuration entries in a
//! backing store, with optional scoping (tenant / environment) and a
//! read-through snapshot cache.
//!
//! ## Features
//!
//! - **Typed binding**: each field of a struct maps to one entry keyed
//!   `{type}.{field}` (trimmed, lower-cased)
//! - **Scopes**: partition entries per tenant or environment; the absent scope
//!   is its own global partition
//! - **Caching**: one snapshot per scope, expiring after a configurable duration
//! - **Stores**: in-memory and file stores built in; PostgreSQL, MySQL and
//!   Redis behind the `postgres`, `mysql` and `redis` features
//! - **Validation**: identifiers and entry sizes are checked before any query
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use confstore::{ConfigManager, DeriveConfigType};
//! use confstore::store::FileStore;
//!
//! #[derive(Debug, Default, DeriveConfigType)]
//! struct CheckoutConfig {
//!     login_required: bool,
//!     max_items: u32,
//!     banner: Option<String>,
//! }
//!
//! # async fn example() -> confstore::Result<()> {
//! let manager = ConfigManager::builder(FileStore::new("config/settings.json"))
//!     .default_scope("production")
//!     .build()?;
//!
//! let mut config: CheckoutConfig = manager.get().await?;
//! config.max_items = 25;
//! manager.save(&config).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Scopes
//!
//! The scope is resolved once per call. Use a fixed scope, the global
//! partition, or a closure:
//!
//! ```rust
//! use confstore::ConfigManager;
//! use confstore::store::MemoryStore;
//!
//! let manager = ConfigManager::builder(MemoryStore::new())
//!     .scope_resolver(|| std::env::var("APP_TENANT").ok())
//!     .build()
//!     .unwrap();
//! ```
//!
//! `get_in_scope` and `save_in_scope` bypass the resolver.
//!
//! ## Consistency
//!
//! `save` writes, then drops the cached snapshot of that scope. A concurrent
//! `get` may still see the previous snapshot until then. Whether it can see a
//! half-applied save depends on the store; see [`store::UpsertAtomicity`].
//!
//! A `get` that misses the cache reads the store and then caches what it
//! read. If a `save` to the same scope lands between that read and the cache
//! fill, the older snapshot is cached after the save has cleared the scope,
//! and later `get`s return it until the cache duration runs out or the scope
//! is invalidated. Callers that need read-your-writes across tasks should use
//! a short cache duration or call [`ConfigManager::invalidate`] after saving.
//!
//! ## Manual Registration
//!
//! Without the `derive` feature, implement [`ConfigType`] with
//! [`config_fields!`]:
//!
//! ```rust
//! use confstore::{config_fields, ConfigType, FieldDescriptor, ValueKind};
//!
//! #[derive(Default)]
//! struct Feature {
//!     enabled: bool,
//! }
//!
//! impl ConfigType for Feature {
//!     const TYPE_NAME: &'static str = "Feature";
//!
//!     fn fields() -> &'static [FieldDescriptor<Self>] {
//!         config_fields!(Feature { "Enabled" => enabled: ValueKind::Bool })
//!     }
//! }
//! ```

// Core modules
mod binding;
mod entry;
mod error;
mod key;
mod manager;
mod serializer;
pub mod security;

// Grouped modules
pub mod cache;
pub mod config;
pub mod format;
pub mod store;

// Re-exports from core
pub use binding::{ConfigType, FieldDescriptor, ValueKind};
pub use entry::{ConfigEntry, Entries, Snapshot, normalize_scope};
pub use error::{Error, Result};
pub use key::{DefaultKeyFormatter, KeyFormatter};
pub use manager::{ConfigManager, ConfigManagerBuilder};
pub use serializer::{ConfigSerializer, JsonSerializer};

// Re-exports from grouped modules
pub use cache::{CacheStrategy, ConfigCache, LruCache, MemoryCache};
pub use config::{ConfigOptions, FixedScope, ScopeResolver};
pub use store::{ConfigStore, UpsertAtomicity};

#[doc(hidden)]
pub mod __private {
    pub use crate::binding::{AnyField, Field, FiniteFloat, FloatField};
    pub use serde_json;
}

// Derive macro re-export (requires `derive` feature)
/// Derive macro for generating [`ConfigType`] implementations.
///
/// Field names become PascalCase key segments (`login_required` ->
/// `LoginRequired`), and each field's [`ValueKind`] is inferred from its type.
///
/// # Example
///
/// ```rust
/// use confstore::{ConfigType, DeriveConfigType, ValueKind};
///
/// #[derive(Default, DeriveConfigType)]
/// #[config(name = "Checkout")]
/// struct CheckoutSettings {
///     login_required: bool,
///     #[config(rename = "Limit")]
///     max_items: u32,
///     #[config(skip)]
///     runtime_only: usize,
/// }
///
/// assert_eq!(CheckoutSettings::TYPE_NAME, "Checkout");
/// let fields = CheckoutSettings::fields();
/// assert_eq!(fields.len(), 2);
/// assert_eq!(fields[1].name, "Limit");
/// assert_eq!(fields[1].kind, ValueKind::Integer);
/// ```
#[cfg(feature = "derive")]
pub use confstore_derive::ConfigType as DeriveConfigType;
