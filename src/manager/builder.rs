//! Builder for ConfigManager
//!
//! This module contains [`ConfigManagerBuilder`] which provides a fluent API
//! for creating a [`ConfigManager`](super::ConfigManager).

use crate::cache::{CacheStrategy, ConfigCache};
use crate::config::{ConfigOptions, FixedScope, ScopeResolver};
use crate::error::Result;
use crate::key::{DefaultKeyFormatter, KeyFormatter};
use crate::serializer::{ConfigSerializer, JsonSerializer};
use crate::store::ConfigStore;
use std::sync::Arc;
use std::time::Duration;

use super::ConfigManager;

/// Builder for creating a [`ConfigManager`] with a fluent API.
///
/// Defaults: scope `"Default"`, snapshots cached for 10 minutes in an
/// unbounded in-memory cache, compact JSON values, `{type}.{field}` keys.
///
/// # Example
///
/// ```rust
/// use confstore::{CacheStrategy, ConfigManager};
/// use confstore::store::MemoryStore;
/// use std::time::Duration;
///
/// let manager = ConfigManager::builder(MemoryStore::new())
///     .scope_resolver(|| std::env::var("TENANT").ok())
///     .cache_duration(Duration::from_secs(30))
///     .cache_strategy(CacheStrategy::Lru(64))
///     .build()
///     .unwrap();
/// ```
pub struct ConfigManagerBuilder {
    store: Arc<dyn ConfigStore>,
    cache: Option<Arc<dyn ConfigCache>>,
    serializer: Arc<dyn ConfigSerializer>,
    key_formatter: Arc<dyn KeyFormatter>,
    options: ConfigOptions,
}

impl ConfigManagerBuilder {
    /// Create a builder over a shared store
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            cache: None,
            serializer: Arc::new(JsonSerializer),
            key_formatter: Arc::new(DefaultKeyFormatter),
            options: ConfigOptions::default(),
        }
    }

    /// Use a fixed scope for every call
    #[must_use]
    pub fn default_scope(mut self, scope: impl Into<String>) -> Self {
        self.options.scope_resolver = Arc::new(FixedScope::new(scope));
        self
    }

    /// Use the global (unscoped) partition for every call
    #[must_use]
    pub fn global_scope(mut self) -> Self {
        self.options.scope_resolver = Arc::new(FixedScope::global());
        self
    }

    /// Resolve the scope per call, e.g. from the current tenant
    #[must_use]
    pub fn scope_resolver(mut self, resolver: impl ScopeResolver + 'static) -> Self {
        self.options.scope_resolver = Arc::new(resolver);
        self
    }

    /// How long a scope's snapshot stays cached (zero disables caching)
    #[must_use]
    pub fn cache_duration(mut self, duration: Duration) -> Self {
        self.options.cache_duration = Some(duration);
        self
    }

    /// Re-read the store on every `get`
    #[must_use]
    pub fn no_cache(mut self) -> Self {
        self.options.cache_duration = None;
        self
    }

    /// Choose how snapshots are held (validated in [`build`](Self::build))
    #[must_use]
    pub fn cache_strategy(mut self, strategy: CacheStrategy) -> Self {
        self.options.cache_strategy = strategy;
        self
    }

    /// Use a custom cache instead of one built from the cache strategy
    #[must_use]
    pub fn with_cache(mut self, cache: impl ConfigCache + 'static) -> Self {
        self.cache = Some(Arc::new(cache));
        self
    }

    #[must_use]
    pub fn with_serializer(mut self, serializer: impl ConfigSerializer + 'static) -> Self {
        self.serializer = Arc::new(serializer);
        self
    }

    #[must_use]
    pub fn with_key_formatter(mut self, formatter: impl KeyFormatter + 'static) -> Self {
        self.key_formatter = Arc::new(formatter);
        self
    }

    /// Replace all options at once
    #[must_use]
    pub fn options(mut self, options: ConfigOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the [`ConfigManager`].
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidCacheStrategy` for `CacheStrategy::Lru(0)`.
    pub fn build(self) -> Result<ConfigManager> {
        self.options.cache_strategy.validate()?;
        let cache = match self.cache {
            Some(cache) => cache,
            None => self.options.cache_strategy.build()?,
        };

        Ok(ConfigManager {
            store: self.store,
            cache,
            serializer: self.serializer,
            key_formatter: self.key_formatter,
            options: self.options,
        })
    }
}

impl std::fmt::Debug for ConfigManagerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManagerBuilder")
            .field("store", &self.store.backend_name())
            .field("custom_cache", &self.cache.is_some())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
