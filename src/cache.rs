//! TTL memoisation for expensive cluster reads.
//!
//! Each key has its own async slot lock, so concurrent misses on the same key
//! wait for the in-flight fetch instead of issuing their own. Failed fetches
//! are never stored.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::Result;

pub const CLUSTER_INFO_KEY: &str = "cluster_info";
pub const ALL_PODS_KEY: &str = "all_pods";
pub const ALL_NODES_KEY: &str = "all_nodes";
pub const ALL_NAMESPACES_KEY: &str = "all_namespaces";

pub fn namespace_pods_key(namespace: &str) -> String {
    format!("pods_namespace_{namespace}")
}

struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    expires_at: Instant,
}

type Slot = Arc<tokio::sync::Mutex<Option<CacheEntry>>>;

pub struct SnapshotCache {
    default_ttl: Duration,
    slots: Mutex<HashMap<String, Slot>>,
}

impl SnapshotCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// [`SnapshotCache::get`] with the configured default TTL.
    pub async fn get_or_fetch<V, F, Fut>(&self, key: &str, producer: F) -> Result<V>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        self.get(key, self.default_ttl, producer).await
    }

    /// Returns the value cached under `key` if it is younger than `ttl`,
    /// otherwise runs `producer` and caches its successful result.
    pub async fn get<V, F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> Result<V>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let slot = self.slot(key);
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref() {
            if Instant::now() < cached.expires_at {
                if let Some(value) = cached.value.downcast_ref::<V>() {
                    log::trace!("cache: hit {key}");
                    return Ok(value.clone());
                }
            }
        }

        log::debug!("cache: miss {key}");
        let value = producer().await?;
        *entry = Some(CacheEntry {
            value: Arc::new(value.clone()),
            expires_at: Instant::now() + ttl,
        });
        Ok(value)
    }

    pub fn invalidate(&self, key: &str) {
        if self.lock_slots().remove(key).is_some() {
            log::debug!("cache: invalidated {key}");
        }
    }

    pub fn clear(&self) {
        self.lock_slots().clear();
    }

    fn slot(&self, key: &str) -> Slot {
        self.lock_slots()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
