use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

use crate::models::Canvas;

/// Wire shape for caching a [`Canvas`] snapshot. The bitmap is base64'd
/// rather than serialized as a JSON byte array, which for a 900x900 canvas
/// would otherwise balloon into millions of comma-separated integers.
#[derive(Serialize, Deserialize)]
struct CachedCanvas {
    width: u32,
    height: u32,
    bitmap_b64: String,
    hash: String,
    last_updated: DateTime<Utc>,
}

impl From<&Canvas> for CachedCanvas {
    fn from(canvas: &Canvas) -> Self {
        Self {
            width: canvas.width,
            height: canvas.height,
            bitmap_b64: STANDARD.encode(&canvas.bitmap),
            hash: canvas.hash.clone(),
            last_updated: canvas.last_updated,
        }
    }
}

impl TryFrom<CachedCanvas> for Canvas {
    type Error = anyhow::Error;

    fn try_from(cached: CachedCanvas) -> Result<Self, Self::Error> {
        Ok(Canvas {
            width: cached.width,
            height: cached.height,
            bitmap: STANDARD.decode(cached.bitmap_b64)?,
            hash: cached.hash,
            last_updated: cached.last_updated,
        })
    }
}

/// Thin wrapper around a Redis connection manager used as the advisory cache
/// tier: canvas snapshot cache-aside, region-lock cache, and the per-user
/// minute-window pixel counter. Every method swallows connection errors and
/// returns a safe fallback (`None`, `0`, or simply not caching) so that a
/// Redis outage degrades the system instead of taking it down — the
/// WindowCounterLimiter built on top of this fails open for the same reason.
#[derive(Clone)]
pub struct CacheService {
    redis: redis::aio::ConnectionManager,
}

impl CacheService {
    pub fn new(redis: redis::aio::ConnectionManager) -> Self {
        Self { redis }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.redis.clone();
        let result: Option<String> = conn.get(key).await.ok()?;
        result.and_then(|s| serde_json::from_str(&s).ok())
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> anyhow::Result<()> {
        let mut conn = self.redis.clone();
        let serialized = serde_json::to_string(value)?;
        conn.set_ex::<_, _, ()>(key, serialized, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    /// Cache-aside pattern: get from cache or fetch and cache.
    pub async fn get_or_set<T, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> anyhow::Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<T>>,
    {
        if let Some(cached) = self.get::<T>(key).await {
            return Ok(cached);
        }

        let value = fetch().await?;
        self.set(key, &value, ttl).await?;
        Ok(value)
    }

    /// Fetch the cached canvas snapshot, base64-decoding the bitmap back
    /// into raw bytes. `None` on a cache miss or a malformed cache entry.
    pub async fn get_canvas(&self, key: &str) -> Option<Canvas> {
        let cached: CachedCanvas = self.get(key).await?;
        Canvas::try_from(cached).ok()
    }

    /// Cache a canvas snapshot, base64-encoding the bitmap for JSON storage.
    pub async fn set_canvas(&self, key: &str, canvas: &Canvas, ttl: Duration) -> anyhow::Result<()> {
        self.set(key, &CachedCanvas::from(canvas), ttl).await
    }

    /// Increment a fixed window counter, setting its expiry only on the
    /// first increment of the window so the window length stays fixed
    /// rather than sliding. Returns `None` on any Redis failure — callers
    /// must treat that as "limit unknown" and fail open.
    pub async fn incr_window(&self, key: &str, window: Duration) -> Option<i64> {
        let mut conn = self.redis.clone();
        let count: i64 = conn.incr(key, 1).await.ok()?;
        if count == 1 {
            let _: Result<(), _> = conn.expire(key, window.as_secs().max(1) as i64).await;
        }
        Some(count)
    }
}

/// Cache key generators, kept in one place so call sites never hand-build keys.
pub mod keys {
    pub fn canvas_state() -> String {
        "canvas:state".to_string()
    }

    pub fn region_locks() -> String {
        "canvas:locks".to_string()
    }

    pub fn pixel_window(user_id: &str) -> String {
        format!("rate_limit:pixels:{}", user_id)
    }
}
