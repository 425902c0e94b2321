//! Scoped snapshot cache
//!
//! The manager caches one [`Snapshot`] per scope (cache-aside). A cache miss,
//! an expired entry and "never cached" look the same to callers. Scopes are
//! matched exactly (case-sensitive); `None` is the global scope.

use crate::entry::Snapshot;
use crate::error::{Error, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

/// Cache strategy for the manager's snapshot cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheStrategy {
    /// Cache every scope until it expires (default)
    #[default]
    Full,
    /// Keep at most this many scopes, evicting the least recently used
    Lru(usize),
    /// No caching - every `get` reads the store
    None,
}

impl CacheStrategy {
    /// Validate cache strategy configuration
    ///
    /// # Errors
    ///
    /// Returns error if LRU size is 0 (would panic on `NonZeroUsize`)
    pub fn validate(&self) -> Result<()> {
        match self {
            CacheStrategy::Lru(size) if *size == 0 => Err(Error::InvalidCacheStrategy(
                "LRU cache size must be greater than 0".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Build the cache implementation for this strategy
    ///
    /// # Errors
    ///
    /// Returns error if the strategy is invalid.
    pub(crate) fn build(&self) -> Result<std::sync::Arc<dyn ConfigCache>> {
        self.validate()?;
        Ok(match self {
            CacheStrategy::Full | CacheStrategy::None => std::sync::Arc::new(MemoryCache::new()),
            CacheStrategy::Lru(size) => std::sync::Arc::new(LruCache::new(*size)?),
        })
    }
}

// =============================================================================
// Cache Trait
// =============================================================================

/// Per-scope snapshot cache with expiry
pub trait ConfigCache: Send + Sync {
    /// Cached snapshot for `scope`, if present and not expired
    fn try_get_all(&self, scope: Option<&str>) -> Option<Snapshot>;

    /// Replace the cached snapshot for `scope`.
    ///
    /// A missing or zero `duration` disables caching and leaves the cache untouched.
    fn set_all(&self, scope: Option<&str>, entries: Snapshot, duration: Option<Duration>);

    /// Remove the snapshot for one scope
    fn clear(&self, scope: Option<&str>);

    /// Remove every cached snapshot
    fn clear_all(&self);
}

#[derive(Debug, Clone)]
struct CachedSnapshot {
    entries: Snapshot,
    expires_at: Instant,
}

impl CachedSnapshot {
    fn new(entries: Snapshot, duration: Duration) -> Option<Self> {
        // Durations too large to represent never expire in practice; clamp to ~100 years.
        let expires_at = Instant::now()
            .checked_add(duration)
            .or_else(|| Instant::now().checked_add(Duration::from_secs(100 * 365 * 24 * 3600)))?;
        Some(Self {
            entries,
            expires_at,
        })
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

fn cache_duration(duration: Option<Duration>) -> Option<Duration> {
    duration.filter(|d| !d.is_zero())
}

// =============================================================================
// In-Memory Cache
// =============================================================================

/// Unbounded concurrent cache with lazy expiry
#[derive(Debug, Default)]
pub struct MemoryCache {
    scopes: DashMap<Option<String>, CachedSnapshot>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of scopes currently held (including expired, not yet evicted ones)
    #[must_use]
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl ConfigCache for MemoryCache {
    fn try_get_all(&self, scope: Option<&str>) -> Option<Snapshot> {
        let key = scope.map(str::to_owned);
        let now = Instant::now();

        {
            let cached = self.scopes.get(&key)?;
            if !cached.is_expired(now) {
                return Some(cached.entries.clone());
            }
        }

        // Only evict if nobody refreshed the entry in between
        self.scopes.remove_if(&key, |_, cached| cached.is_expired(now));
        None
    }

    fn set_all(&self, scope: Option<&str>, entries: Snapshot, duration: Option<Duration>) {
        let Some(duration) = cache_duration(duration) else {
            return;
        };
        if let Some(cached) = CachedSnapshot::new(entries, duration) {
            self.scopes.insert(scope.map(str::to_owned), cached);
        }
    }

    fn clear(&self, scope: Option<&str>) {
        self.scopes.remove(&scope.map(str::to_owned));
    }

    fn clear_all(&self) {
        self.scopes.clear();
    }
}

// =============================================================================
// LRU Cache
// =============================================================================

/// Bounded cache that evicts the least recently used scope
pub struct LruCache {
    scopes: Mutex<lru::LruCache<Option<String>, CachedSnapshot>>,
}

impl LruCache {
    /// Create a cache holding at most `capacity` scopes
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidCacheStrategy` if `capacity` is 0.
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            Error::InvalidCacheStrategy("LRU cache size must be greater than 0".into())
        })?;
        Ok(Self {
            scopes: Mutex::new(lru::LruCache::new(capacity)),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scopes.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.lock().is_empty()
    }
}

impl std::fmt::Debug for LruCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scopes = self.scopes.lock();
        f.debug_struct("LruCache")
            .field("len", &scopes.len())
            .field("cap", &scopes.cap())
            .finish()
    }
}

impl ConfigCache for LruCache {
    fn try_get_all(&self, scope: Option<&str>) -> Option<Snapshot> {
        let key = scope.map(str::to_owned);
        let now = Instant::now();
        let mut scopes = self.scopes.lock();

        let cached = scopes.get(&key)?;
        if !cached.is_expired(now) {
            return Some(cached.entries.clone());
        }

        scopes.pop(&key);
        None
    }

    fn set_all(&self, scope: Option<&str>, entries: Snapshot, duration: Option<Duration>) {
        let Some(duration) = cache_duration(duration) else {
            return;
        };
        if let Some(cached) = CachedSnapshot::new(entries, duration) {
            self.scopes.lock().put(scope.map(str::to_owned), cached);
        }
    }

    fn clear(&self, scope: Option<&str>) {
        self.scopes.lock().pop(&scope.map(str::to_owned));
    }

    fn clear_all(&self) {
        self.scopes.lock().clear();
    }
}
