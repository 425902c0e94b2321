//! Configuration manager
//!
//! This module contains [`ConfigManager`], the entry point that binds
//! [`ConfigType`]s to a [`ConfigStore`] through a read-through snapshot cache.

mod blocking;
mod builder;

pub use builder::ConfigManagerBuilder;

use crate::binding::ConfigType;
use crate::cache::ConfigCache;
use crate::config::ConfigOptions;
use crate::entry::{ConfigEntry, Entries, Snapshot, normalize_scope};
use crate::error::{Error, Result};
use crate::key::KeyFormatter;
use crate::serializer::ConfigSerializer;
use crate::store::ConfigStore;
use log::debug;
use std::sync::Arc;

/// Binds configuration types to a store.
///
/// `get` reads every entry of the resolved scope (from the cache when
/// possible) and fills a default-constructed `T` field by field; fields with
/// no stored entry keep their default. `save` writes one entry per field and
/// then drops the cached snapshot of that scope.
///
/// # Example
///
/// ```rust
/// use confstore::{ConfigManager, DeriveConfigType};
/// use confstore::store::MemoryStore;
///
/// #[derive(Debug, Default, PartialEq, DeriveConfigType)]
/// struct CheckoutConfig {
///     login_required: bool,
///     max_items: u32,
/// }
///
/// # async fn run() -> confstore::Result<()> {
/// let manager = ConfigManager::builder(MemoryStore::new()).build()?;
///
/// let config = CheckoutConfig { login_required: true, max_items: 10 };
/// manager.save(&config).await?;
///
/// let loaded: CheckoutConfig = manager.get().await?;
/// assert_eq!(loaded, config);
/// # Ok(())
/// # }
/// ```
pub struct ConfigManager {
    store: Arc<dyn ConfigStore>,
    cache: Arc<dyn ConfigCache>,
    serializer: Arc<dyn ConfigSerializer>,
    key_formatter: Arc<dyn KeyFormatter>,
    options: ConfigOptions,
}

impl ConfigManager {
    /// Start building a manager over `store`
    pub fn builder<S: ConfigStore + 'static>(store: S) -> ConfigManagerBuilder {
        ConfigManagerBuilder::new(Arc::new(store))
    }

    /// Manager over `store` with default options
    ///
    /// # Errors
    ///
    /// Never fails with the default options; see [`ConfigManagerBuilder::build`].
    pub fn new<S: ConfigStore + 'static>(store: S) -> Result<Self> {
        Self::builder(store).build()
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Load `T` from the scope returned by the configured resolver
    ///
    /// # Errors
    ///
    /// Returns an error if a field name is invalid, the store fails, or a
    /// stored value cannot be decoded into its field.
    pub async fn get<T: ConfigType + Default>(&self) -> Result<T> {
        let scope = self.resolve_scope();
        self.get_in_scope(scope.as_deref()).await
    }

    /// Load `T` from an explicit scope (`None` is the global scope)
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub async fn get_in_scope<T: ConfigType + Default>(&self, scope: Option<&str>) -> Result<T> {
        let scope = normalize_scope(scope);
        let keys = self.field_keys::<T>()?;
        let entries = self.snapshot(scope).await?;

        let mut config = T::default();
        for (field, key) in T::fields().iter().zip(&keys) {
            let Some(entry) = entries.get(key) else {
                continue;
            };

            let decoded = self
                .serializer
                .deserialize(entry.value(), field.kind)
                .map_err(|e| invalid_value(key, &e))?;
            if let Some(value) = decoded {
                (field.set)(&mut config, value).map_err(|e| invalid_value(key, &e))?;
            }
        }

        Ok(config)
    }

    /// Every entry of `scope`, keyed by normalized key (cache-aside)
    ///
    /// # Errors
    ///
    /// Returns the store's error on a cache miss.
    pub async fn snapshot(&self, scope: Option<&str>) -> Result<Snapshot> {
        let scope = normalize_scope(scope);

        if let Some(snapshot) = self.cache.try_get_all(scope) {
            debug!("Config cache hit for scope {}", scope_label(scope));
            return Ok(snapshot);
        }
        debug!("Config cache miss for scope {}", scope_label(scope));

        let stored = self.store.get_all(scope).await?;
        let entries: Entries = stored
            .into_values()
            .map(|entry| {
                let key = self.key_formatter.normalize(entry.key());
                (key.clone(), entry.with_key(key))
            })
            .collect();
        let snapshot: Snapshot = Arc::new(entries);

        if let Some(duration) = self.options.effective_cache_duration() {
            self.cache
                .set_all(scope, Arc::clone(&snapshot), Some(duration));
            debug!(
                "Cached {} entries for scope {} ({} backend)",
                snapshot.len(),
                scope_label(scope),
                self.store.backend_name()
            );
        }

        Ok(snapshot)
    }

    // =========================================================================
    // Write
    // =========================================================================

    /// Save every field of `value` into the resolved scope
    ///
    /// # Errors
    ///
    /// Returns an error if a field name is invalid, a value cannot be
    /// encoded, or the store rejects the batch.
    pub async fn save<T: ConfigType>(&self, value: &T) -> Result<()> {
        let scope = self.resolve_scope();
        self.save_in_scope(value, scope.as_deref()).await
    }

    /// Save every field of `value` into an explicit scope
    ///
    /// # Errors
    ///
    /// See [`save`](Self::save).
    pub async fn save_in_scope<T: ConfigType>(&self, value: &T, scope: Option<&str>) -> Result<()> {
        let scope = normalize_scope(scope);
        let entries = self.to_entries(value, scope)?;

        if entries.is_empty() {
            debug!(
                "{} has no bindable fields, nothing to save",
                T::TYPE_NAME
            );
            return Ok(());
        }

        self.store.upsert(&entries, scope).await?;
        self.cache.clear(scope);

        debug!(
            "Saved {} ({} entries) to scope {}",
            T::TYPE_NAME,
            entries.len(),
            scope_label(scope)
        );
        Ok(())
    }

    fn to_entries<T: ConfigType>(&self, value: &T, scope: Option<&str>) -> Result<Vec<ConfigEntry>> {
        let keys = self.field_keys::<T>()?;
        let mut entries = Vec::with_capacity(keys.len());

        for (field, key) in T::fields().iter().zip(keys) {
            let current = (field.get)(value).map_err(|e| invalid_value(&key, &e))?;
            if current.is_null() && is_scalar(field.kind) {
                return Err(invalid_value(&key, &format_args!("{} field produced null", field.kind)));
            }
            let text = self.serializer.serialize(&current, field.kind)?;
            entries.push(ConfigEntry::scoped(key, text, scope));
        }

        Ok(entries)
    }

    fn field_keys<T: ConfigType>(&self) -> Result<Vec<String>> {
        T::fields()
            .iter()
            .map(|field| self.key_formatter.key(T::TYPE_NAME, field.name))
            .collect()
    }

    // =========================================================================
    // Cache control & accessors
    // =========================================================================

    /// Drop the cached snapshot of one scope
    pub fn invalidate(&self, scope: Option<&str>) {
        self.cache.clear(normalize_scope(scope));
        debug!("Config cache invalidated for scope {}", scope_label(scope));
    }

    /// Drop every cached snapshot
    pub fn clear_cache(&self) {
        self.cache.clear_all();
        debug!("Config cache cleared");
    }

    /// Scope the next `get`/`save` would use (blank normalized to `None`)
    #[must_use]
    pub fn resolve_scope(&self) -> Option<String> {
        self.options.resolve_scope()
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<dyn ConfigCache> {
        &self.cache
    }

    #[must_use]
    pub fn options(&self) -> &ConfigOptions {
        &self.options
    }
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("store", &self.store.backend_name())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn invalid_value(key: &str, err: &dyn std::fmt::Display) -> Error {
    Error::InvalidValue {
        key: key.to_string(),
        reason: err.to_string(),
    }
}

/// Kinds whose values are never legitimately `null`
fn is_scalar(kind: crate::binding::ValueKind) -> bool {
    use crate::binding::ValueKind;
    matches!(
        kind,
        ValueKind::Bool | ValueKind::Integer | ValueKind::Float | ValueKind::Text
    )
}

fn scope_label(scope: Option<&str>) -> &str {
    normalize_scope(scope).unwrap_or("<global>")
}
