use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::RwLock;

/// Fixed-point scale used to represent fractional token counts as `u64`
/// atomics without a lock around the per-user entry.
const SCALE: u64 = 1_000_000;

struct Bucket {
    tokens_scaled: AtomicU64,
    last_refill_us: AtomicU64,
    last_seen_us: AtomicU64,
}

impl Bucket {
    fn full(now_us: u64, capacity_scaled: u64) -> Self {
        Self {
            tokens_scaled: AtomicU64::new(capacity_scaled),
            last_refill_us: AtomicU64::new(now_us),
            last_seen_us: AtomicU64::new(now_us),
        }
    }
}

/// Per-user in-process burst limiter. Authoritative tier of the two-stage
/// rate limiter: unlike the window counter, this never fails open, since it
/// holds no external dependency to fail.
///
/// Buckets are created lazily, seeded to full, and refilled continuously on
/// each check using a CAS loop over atomics rather than a lock per user.
pub struct TokenBucketLimiter {
    buckets: RwLock<HashMap<String, Arc<Bucket>>>,
    capacity_scaled: u64,
    refill_scaled_per_sec: u64,
    idle_ttl: Duration,
    epoch: std::time::Instant,
}

impl TokenBucketLimiter {
    pub fn new(capacity: u32, refill_per_sec: f64, idle_ttl: Duration) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            capacity_scaled: (capacity as u64) * SCALE,
            refill_scaled_per_sec: (refill_per_sec * SCALE as f64).round() as u64,
            idle_ttl,
            epoch: std::time::Instant::now(),
        }
    }

    fn now_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    async fn bucket_for(&self, user: &str) -> Arc<Bucket> {
        {
            let buckets = self.buckets.read().await;
            if let Some(b) = buckets.get(user) {
                return b.clone();
            }
        }
        let mut buckets = self.buckets.write().await;
        let now = self.now_us();
        buckets
            .entry(user.to_string())
            .or_insert_with(|| Arc::new(Bucket::full(now, self.capacity_scaled)))
            .clone()
    }

    fn refill(&self, bucket: &Bucket, now_us: u64) {
        let mut last = bucket.last_refill_us.load(Ordering::Acquire);
        loop {
            if now_us <= last {
                return;
            }
            match bucket.last_refill_us.compare_exchange(
                last,
                now_us,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(next) => last = next,
            }
        }

        let elapsed_us = now_us - last;
        let add = ((elapsed_us as u128 * self.refill_scaled_per_sec as u128) / 1_000_000) as u64;
        if add == 0 {
            return;
        }

        let mut current = bucket.tokens_scaled.load(Ordering::Relaxed);
        loop {
            let updated = current.saturating_add(add).min(self.capacity_scaled);
            match bucket.tokens_scaled.compare_exchange(
                current,
                updated,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(next) => current = next,
            }
        }
    }

    fn try_consume(&self, bucket: &Bucket) -> bool {
        let mut current = bucket.tokens_scaled.load(Ordering::Relaxed);
        loop {
            if current < SCALE {
                return false;
            }
            let updated = current - SCALE;
            match bucket.tokens_scaled.compare_exchange(
                current,
                updated,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(next) => current = next,
            }
        }
    }

    /// Admit one token for `user`, refilling first. Lazily creates and seeds
    /// a full bucket on first use.
    pub async fn check(&self, user: &str) -> bool {
        let bucket = self.bucket_for(user).await;
        let now = self.now_us();
        bucket.last_seen_us.store(now, Ordering::Release);
        self.refill(&bucket, now);
        self.try_consume(&bucket)
    }

    /// Whole tokens currently available for `user`, after refilling. Used
    /// only to compose a denial message; never consumes a token.
    pub async fn remaining_tokens(&self, user: &str) -> u64 {
        let bucket = self.bucket_for(user).await;
        let now = self.now_us();
        self.refill(&bucket, now);
        bucket.tokens_scaled.load(Ordering::Relaxed) / SCALE
    }

    /// Remove buckets that haven't been touched within `idle_ttl`.
    pub async fn sweep_idle(&self) {
        let now = self.now_us();
        let idle_us = self.idle_ttl.as_micros() as u64;
        let mut buckets = self.buckets.write().await;
        buckets.retain(|_, b| now.saturating_sub(b.last_seen_us.load(Ordering::Acquire)) <= idle_us);
    }

    pub fn spawn_sweeper(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.idle_ttl);
            loop {
                ticker.tick().await;
                self.sweep_idle().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_up_to_capacity_then_denies() {
        let limiter = TokenBucketLimiter::new(3, 0.0, Duration::from_secs(300));
        assert!(limiter.check("u1").await);
        assert!(limiter.check("u1").await);
        assert!(limiter.check("u1").await);
        assert!(!limiter.check("u1").await);
    }

    #[tokio::test]
    async fn buckets_are_isolated_per_user() {
        let limiter = TokenBucketLimiter::new(1, 0.0, Duration::from_secs(300));
        assert!(limiter.check("a").await);
        assert!(!limiter.check("a").await);
        assert!(limiter.check("b").await);
    }

    #[tokio::test]
    async fn refills_over_time() {
        let limiter = TokenBucketLimiter::new(1, 1000.0, Duration::from_secs(300));
        assert!(limiter.check("u1").await);
        assert!(!limiter.check("u1").await);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(limiter.check("u1").await);
    }
}
