//! Time-bounded caches shared across discovery cycles
//!
//! `ExpiringCache` is a sharded key-value store whose entries expire on a
//! wall-clock TTL. Values are stored type-erased so several record kinds can
//! share one store; reading a key back as the wrong type is reported as a
//! cache-integrity error instead of being treated as a miss.
//! `OwnershipCache` is the typed view used by the ownership resolver.

use crate::error::{DiscoveryError, Result};
use crate::models::OwnershipRecord;
use dashmap::DashMap;
use std::any::{type_name, Any};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default lifetime of a cached ownership record (24 hours)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest lifetime an entry may be given (one year)
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Key-value store with per-entry expiry
pub struct ExpiringCache {
    entries: DashMap<String, CacheEntry>,
    default_ttl: Duration,
}

impl ExpiringCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Store a value. `ttl` of `None` uses the cache's default TTL; any TTL
    /// is capped at [`MAX_CACHE_TTL`].
    pub fn set<T>(&self, key: impl Into<String>, value: T, ttl: Option<Duration>)
    where
        T: Any + Send + Sync,
    {
        let ttl = ttl.unwrap_or(self.default_ttl).min(MAX_CACHE_TTL);
        let now = Instant::now();
        let expires_at = now.checked_add(ttl).unwrap_or(now);
        self.entries.insert(
            key.into(),
            CacheEntry {
                value: Arc::new(value),
                expires_at,
            },
        );
    }

    /// Look up a live entry and read it as `T`
    pub fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: Any + Clone,
    {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            None => return Ok(None),
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => {
                return entry
                    .value
                    .downcast_ref::<T>()
                    .cloned()
                    .map(Some)
                    .ok_or_else(|| DiscoveryError::CacheIntegrity {
                        key: key.to_string(),
                        expected: type_name::<T>(),
                    });
            }
        };

        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
            debug!(key = %key, "Cache entry expired");
        }
        Ok(None)
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Instance identity -> resolved controller
#[derive(Clone)]
pub struct OwnershipCache {
    store: Arc<ExpiringCache>,
}

impl OwnershipCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: Arc::new(ExpiringCache::new(ttl)),
        }
    }

    /// Build on top of a store shared with other record kinds
    pub fn with_store(store: Arc<ExpiringCache>) -> Self {
        Self { store }
    }

    pub fn get(&self, key: &str) -> Result<Option<OwnershipRecord>> {
        self.store.get::<OwnershipRecord>(key)
    }

    pub fn insert(&self, key: impl Into<String>, record: OwnershipRecord) {
        self.store.set(key, record, None);
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.store.remove(key)
    }

    pub fn purge_expired(&self) -> usize {
        self.store.purge_expired()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.store.default_ttl()
    }
}

impl Default for OwnershipCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}
