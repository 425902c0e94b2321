//! Manager configuration types

use crate::cache::CacheStrategy;
use crate::entry::normalize_scope;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Scope used when none is configured
pub const DEFAULT_SCOPE: &str = "Default";

/// Snapshot lifetime used when none is configured (10 minutes)
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(10 * 60);

/// Supplies the scope for each `get`/`save` call.
///
/// Implemented for [`FixedScope`] and for plain closures:
///
/// ```rust
/// use confstore::ScopeResolver;
///
/// let tenant = || Some("tenant-a".to_string());
/// assert_eq!(tenant.current_scope().as_deref(), Some("tenant-a"));
/// ```
pub trait ScopeResolver: Send + Sync {
    /// Current scope; `None` or a blank string means the global scope
    fn current_scope(&self) -> Option<String>;
}

impl<F> ScopeResolver for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn current_scope(&self) -> Option<String> {
        self()
    }
}

/// A scope fixed at construction time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedScope(Option<String>);

impl FixedScope {
    /// Always resolve to `scope`
    pub fn new(scope: impl Into<String>) -> Self {
        Self(Some(scope.into()))
    }

    /// Always resolve to the global scope
    #[must_use]
    pub fn global() -> Self {
        Self(None)
    }
}

impl Default for FixedScope {
    fn default() -> Self {
        Self::new(DEFAULT_SCOPE)
    }
}

impl ScopeResolver for FixedScope {
    fn current_scope(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Runtime options for a [`ConfigManager`](crate::ConfigManager)
#[derive(Clone)]
pub struct ConfigOptions {
    /// Resolves the scope of every call that does not pass one explicitly
    pub scope_resolver: Arc<dyn ScopeResolver>,

    /// Snapshot lifetime; `None` or zero re-reads the store on every `get`
    pub cache_duration: Option<Duration>,

    /// How snapshots are held in memory
    pub cache_strategy: CacheStrategy,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            scope_resolver: Arc::new(FixedScope::default()),
            cache_duration: Some(DEFAULT_CACHE_DURATION),
            cache_strategy: CacheStrategy::Full,
        }
    }
}

impl fmt::Debug for ConfigOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigOptions")
            .field("scope_resolver", &"Arc<dyn ScopeResolver>")
            .field("cache_duration", &self.cache_duration)
            .field("cache_strategy", &self.cache_strategy)
            .finish()
    }
}

impl ConfigOptions {
    /// Resolve the scope for one operation, normalizing blank to global
    #[must_use]
    pub fn resolve_scope(&self) -> Option<String> {
        let scope = self.scope_resolver.current_scope();
        normalize_scope(scope.as_deref()).map(str::to_owned)
    }

    /// Duration actually handed to the cache (always `None` when caching is off)
    #[must_use]
    pub fn effective_cache_duration(&self) -> Option<Duration> {
        match self.cache_strategy {
            CacheStrategy::None => None,
            _ => self.cache_duration.filter(|d| !d.is_zero()),
        }
    }
}
