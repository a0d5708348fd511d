//! Short-lived identity cache.
//!
//! Avoids an identity-store round trip on every request. Entries are keyed by
//! identity key and expire after a fixed TTL measured on the monotonic clock,
//! so wall-clock jumps never extend or shorten their validity.
//!
//! There is no background timer: [`IdentityCache::resolve`] evicts stale
//! entries before every lookup, so memory is bounded by call frequency.
//! Concurrent [`IdentityCache::store`] calls for one key are last-write-wins;
//! entries are projections of external state, so either write is correct.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, trace};

use slideai_core::logging::{COMPONENT, OPERATION, RESULT_COUNT, SUBSYSTEM, USER_ID};
use slideai_core::{Clock, Identity};

/// A cached identity and the monotonic instant it was stored.
#[derive(Debug, Clone)]
pub struct CachedIdentity {
    pub identity: Identity,
    pub stored_at: Duration,
}

/// Counters for monitoring cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Identity cache with a fixed TTL.
#[derive(Clone)]
pub struct IdentityCache {
    inner: Arc<IdentityCacheInner>,
}

struct IdentityCacheInner {
    entries: RwLock<HashMap<String, CachedIdentity>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl IdentityCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(IdentityCacheInner {
                entries: RwLock::new(HashMap::new()),
                ttl,
                clock,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// An entry is stale once its age reaches the TTL.
    fn is_fresh(&self, entry: &CachedIdentity, now: Duration) -> bool {
        now.saturating_sub(entry.stored_at) < self.inner.ttl
    }

    /// Return the cached identity for `key` if it is still within the TTL.
    pub async fn resolve(&self, key: &str) -> Option<Identity> {
        self.evict_expired().await;

        let now = self.inner.clock.elapsed();
        let entries = self.inner.entries.read().await;
        match entries.get(key) {
            Some(entry) if self.is_fresh(entry, now) => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                trace!(
                    { SUBSYSTEM } = "service",
                    { COMPONENT } = "identity_cache",
                    { USER_ID } = entry.identity.id,
                    "Cache hit"
                );
                Some(entry.identity.clone())
            }
            _ => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or overwrite the entry for `key` with a fresh timestamp.
    pub async fn store(&self, key: &str, identity: Identity) {
        let stored_at = self.inner.clock.elapsed();
        self.inner.entries.write().await.insert(
            key.to_string(),
            CachedIdentity {
                identity,
                stored_at,
            },
        );
    }

    /// Drop the entry for `key`, if any.
    pub async fn invalidate(&self, key: &str) -> bool {
        self.inner.entries.write().await.remove(key).is_some()
    }

    /// Remove every entry whose age has reached the TTL. Returns the count.
    pub async fn evict_expired(&self) -> usize {
        let now = self.inner.clock.elapsed();
        let mut entries = self.inner.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| self.is_fresh(entry, now));
        let evicted = before - entries.len();

        if evicted > 0 {
            self.inner
                .evictions
                .fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(
                { SUBSYSTEM } = "service",
                { COMPONENT } = "identity_cache",
                { OPERATION } = "evict_expired",
                { RESULT_COUNT } = evicted,
                "Evicted stale identities"
            );
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
        }
    }
}
