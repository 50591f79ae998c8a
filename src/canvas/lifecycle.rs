use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
    time::interval,
};

use crate::{
    canvas::{
        applier::Applier,
        batcher::{Batcher, QueuedEdit},
        broadcaster::Broadcaster,
        lock_index::LockIndex,
        token_bucket::TokenBucketLimiter,
        window_limiter::WindowCounterLimiter,
    },
    config::CanvasConfig,
    services::{CacheService, Persistence},
};

/// Bundles the real-time edit pipeline's long-lived singletons — the two
/// rate limiters, the lock index, the Batcher, and the Broadcaster — and
/// owns the flush ticker and Applier tasks. One instance lives for the
/// whole process; `routes` and `canvas::ingress` only ever see it through
/// `Arc<CanvasCore>`.
pub struct CanvasCore {
    pub token_bucket: Arc<TokenBucketLimiter>,
    pub window_limiter: Arc<WindowCounterLimiter>,
    pub lock_index: Arc<LockIndex>,
    pub batcher: Arc<Batcher>,
    pub broadcaster: Arc<Broadcaster>,
    shutdown_tx: watch::Sender<bool>,
    ticker_handle: Mutex<Option<JoinHandle<()>>>,
    applier_handle: Mutex<Option<JoinHandle<()>>>,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
}

impl CanvasCore {
    /// Construct every singleton, bootstrap the Applier's in-memory canvas
    /// from Cache/Persistence, and launch the flush ticker, the Applier
    /// task, and the idle-bucket sweeper.
    pub async fn start(
        persistence: Arc<dyn Persistence>,
        cache: CacheService,
        config: &CanvasConfig,
    ) -> anyhow::Result<Arc<Self>> {
        let broadcaster = Broadcaster::with_queue_capacity(config.subscriber_queue_cap);
        let lock_index = Arc::new(LockIndex::new(
            cache.clone(),
            persistence.clone(),
            Duration::from_secs(config.lock_cache_ttl_sec),
        ));
        let token_bucket = Arc::new(TokenBucketLimiter::new(
            config.bucket_capacity,
            config.bucket_refill_per_sec,
            Duration::from_secs(config.idle_bucket_ttl_sec),
        ));
        let window_limiter = Arc::new(WindowCounterLimiter::new(
            cache.clone(),
            Duration::from_secs(60),
            config.minute_window_max,
        ));

        let applier = Applier::bootstrap(
            persistence,
            cache,
            lock_index.clone(),
            broadcaster.clone(),
            config.width,
            config.height,
            config.empty_fill,
            Duration::from_secs(config.canvas_cache_ttl_sec),
        )
        .await?;

        let (to_applier, from_batcher) = mpsc::channel(8);
        let batcher = Batcher::new(to_applier, broadcaster.clone(), config.max_batch_size);
        let applier_handle = tokio::spawn(applier.run(from_batcher));
        let sweeper_handle = token_bucket.clone().spawn_sweeper();

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let ticker_batcher = batcher.clone();
        let flush_interval = Duration::from_millis(config.flush_interval_ms);
        let ticker_handle = tokio::spawn(async move {
            let mut ticker = interval(flush_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => ticker_batcher.flush_tick().await,
                    _ = shutdown_rx.changed() => break,
                }
            }
        });

        Ok(Arc::new(Self {
            token_bucket,
            window_limiter,
            lock_index,
            batcher,
            broadcaster,
            shutdown_tx,
            ticker_handle: Mutex::new(Some(ticker_handle)),
            applier_handle: Mutex::new(Some(applier_handle)),
            sweeper_handle: Mutex::new(Some(sweeper_handle)),
        }))
    }

    /// Composite admission check: the in-process token bucket first
    /// (authoritative, never fails open), then the cross-process window
    /// counter (advisory, fails open on Cache trouble). The reported reason
    /// names the denying limiter, matching `original_source/app/rate_limiter.py`'s
    /// two distinct messages rather than one opaque string for both tiers.
    pub async fn admit(&self, user: &str) -> Result<(), String> {
        if !self.token_bucket.check(user).await {
            let remaining = self.token_bucket.remaining_tokens(user).await;
            return Err(format!("Rate limit exceeded. {} tokens remaining.", remaining));
        }
        if !self.window_limiter.check(user).await {
            let remaining = self.window_limiter.remaining_pixels(user).await;
            return Err(format!("Minute rate limit exceeded. {} pixels remaining.", remaining));
        }
        Ok(())
    }

    pub async fn submit(&self, edit: QueuedEdit) -> crate::canvas::batcher::SubmitOutcome {
        self.batcher.submit(edit).await
    }

    /// Shutdown sequence per spec: stop the flush ticker, run one final
    /// flush, wait for the Applier to drain it (and its broadcast to be
    /// enqueued), then close every subscriber with a graceful frame.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.ticker_handle.lock().await.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.sweeper_handle.lock().await.take() {
            handle.abort();
        }

        self.batcher.flush_tick().await;
        self.batcher.shutdown_applier().await;

        if let Some(handle) = self.applier_handle.lock().await.take() {
            let _ = handle.await;
        }

        self.broadcaster.shutdown().await;
    }
}
