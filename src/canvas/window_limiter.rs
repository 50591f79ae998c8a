use std::time::Duration;

use crate::services::{cache_service::keys, CacheService};

/// Per-user minute-window limiter backed by the Cache tier. Advisory: on
/// Cache failure this fails open rather than denying, so a cache outage
/// degrades to burst-only limiting instead of blocking all edits.
pub struct WindowCounterLimiter {
    cache: CacheService,
    window: Duration,
    max_per_window: i64,
}

impl WindowCounterLimiter {
    pub fn new(cache: CacheService, window: Duration, max_per_window: i64) -> Self {
        Self {
            cache,
            window,
            max_per_window,
        }
    }

    /// Returns `true` if `user` may submit another edit under the rolling
    /// window, `false` only when the Cache answered and the post-increment
    /// count exceeds the configured maximum.
    pub async fn check(&self, user: &str) -> bool {
        let key = keys::pixel_window(user);
        match self.cache.incr_window(&key, self.window).await {
            Some(count) => count <= self.max_per_window,
            None => true,
        }
    }

    /// Pixels still available to `user` in the current window, for a denial
    /// message. Re-reads the counter rather than the count `check` already
    /// saw, since the two calls aren't atomic with each other this is only
    /// ever used for a human-facing reason string, not an admission decision.
    pub async fn remaining_pixels(&self, user: &str) -> i64 {
        let key = keys::pixel_window(user);
        let count = self.cache.get::<i64>(&key).await.unwrap_or(0);
        (self.max_per_window - count).max(0)
    }
}
