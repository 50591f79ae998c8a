use std::{sync::Arc, time::Duration};

use crate::{
    models::RegionLock,
    services::{cache_service::keys, CacheService, Persistence},
};

/// Fast "is (x,y) inside any active lock rectangle?" query, backed by the
/// Cache for list reads with Persistence as the fallback on a miss. Lock
/// mutations invalidate the cached list so the next read goes to
/// Persistence and repopulates the cache.
pub struct LockIndex {
    cache: CacheService,
    persistence: Arc<dyn Persistence>,
    ttl: Duration,
}

impl LockIndex {
    pub fn new(cache: CacheService, persistence: Arc<dyn Persistence>, ttl: Duration) -> Self {
        Self {
            cache,
            persistence,
            ttl,
        }
    }

    async fn locks(&self) -> Vec<RegionLock> {
        let persistence = self.persistence.clone();
        self.cache
            .get_or_set(&keys::region_locks(), self.ttl, move || {
                let persistence = persistence.clone();
                async move { persistence.list_locks().await }
            })
            .await
            .unwrap_or_default()
    }

    /// Linear scan over the active lock list; expected small (<10^3 active
    /// locks), so this stays cheaper than maintaining a spatial index.
    pub async fn is_locked(&self, x: u32, y: u32) -> bool {
        self.locks().await.iter().any(|lock| lock.contains(x, y))
    }

    pub async fn list(&self) -> Vec<RegionLock> {
        self.locks().await
    }

    pub async fn put(&self, lock: RegionLock) -> anyhow::Result<()> {
        self.persistence.put_lock(&lock).await?;
        self.invalidate().await;
        Ok(())
    }

    pub async fn remove(&self, x1: u32, y1: u32, x2: u32, y2: u32) -> anyhow::Result<()> {
        self.persistence.delete_lock(x1, y1, x2, y2).await?;
        self.invalidate().await;
        Ok(())
    }

    async fn invalidate(&self) {
        let _ = self.cache.delete(&keys::region_locks()).await;
    }
}
