use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{collections::HashMap, net::IpAddr, num::NonZeroU32, sync::Arc, time::Duration};
use tokio::sync::RwLock;

// ---------------------------------------------------------------------------
// Global (non-keyed) rate limiter
// ---------------------------------------------------------------------------

/// A shared global rate limiter (not keyed by IP).
pub type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

pub fn create_rate_limiter(requests_per_minute: u32) -> SharedRateLimiter {
    let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap());
    Arc::new(RateLimiter::direct(quota))
}

// ---------------------------------------------------------------------------
// Per-IP rate limiter — keyed variant
// ---------------------------------------------------------------------------

/// A per-IP rate limiter backed by an in-memory HashMap.
///
/// Each unique IP address gets its own token bucket. Old entries are lazily
/// evicted when the map is accessed and their bucket has been idle for longer
/// than `cleanup_after`.
///
/// This guards the thin HTTP surface (snapshot, image, palette, lock CRUD,
/// health). The WebSocket edit path has its own two-tier limiter and never
/// goes through this one.
#[derive(Clone)]
pub struct PerIpRateLimiter {
    buckets: Arc<RwLock<HashMap<IpAddr, Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>>>>,
    quota: Quota,
    cleanup_after: Duration,
}

impl PerIpRateLimiter {
    pub fn new(requests_per_minute: u32, cleanup_after: Duration) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap());
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            quota,
            cleanup_after,
        }
    }

    pub async fn check(&self, ip: IpAddr) -> Result<(), RateLimitError> {
        {
            let buckets = self.buckets.read().await;
            if let Some(limiter) = buckets.get(&ip) {
                return match limiter.check() {
                    Ok(_) => Ok(()),
                    Err(_) => Err(RateLimitError),
                };
            }
        }

        let mut buckets = self.buckets.write().await;
        let limiter = buckets
            .entry(ip)
            .or_insert_with(|| Arc::new(RateLimiter::direct(self.quota)));

        match limiter.check() {
            Ok(_) => Ok(()),
            Err(_) => Err(RateLimitError),
        }
    }

    /// Remove buckets whose tokens have fully replenished, i.e. have been
    /// idle long enough that they're no longer worth tracking.
    pub async fn cleanup(&self) {
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|_ip, limiter| limiter.check().is_err());
        let removed = before - buckets.len();
        if removed > 0 {
            tracing::debug!(
                "Rate limiter cleanup: removed {} idle buckets, {} remaining",
                removed,
                buckets.len()
            );
        }
    }

    pub fn spawn_cleanup_task(self) -> tokio::task::JoinHandle<()> {
        let interval = self.cleanup_after;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.cleanup().await;
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct RateLimitError;

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        (
            StatusCode::TOO_MANY_REQUESTS,
            [("retry-after", "60"), ("x-ratelimit-exceeded", "true")],
            "Rate limit exceeded. Please try again later.",
        )
            .into_response()
    }
}

// ---------------------------------------------------------------------------
// Axum middleware functions
// ---------------------------------------------------------------------------

/// Extract the client IP address from the request.
///
/// Checks (in order):
/// 1. `X-Forwarded-For` header (first entry — set by reverse proxies like Nginx)
/// 2. `X-Real-Ip` header
/// 3. The connected peer address from the connection info
/// 4. Falls back to 127.0.0.1
pub fn extract_client_ip(request: &Request) -> IpAddr {
    if let Some(xff) = request.headers().get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(first_ip) = xff_str.split(',').next() {
                if let Ok(ip) = first_ip.trim().parse::<IpAddr>() {
                    return ip;
                }
            }
        }
    }

    if let Some(xri) = request.headers().get("x-real-ip") {
        if let Ok(xri_str) = xri.to_str() {
            if let Ok(ip) = xri_str.trim().parse::<IpAddr>() {
                return ip;
            }
        }
    }

    if let Some(connect_info) = request
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
    {
        return connect_info.0.ip();
    }

    IpAddr::V4(std::net::Ipv4Addr::LOCALHOST)
}

/// Per-IP rate-limiting Axum middleware.
pub async fn per_ip_rate_limit(
    limiter: PerIpRateLimiter,
    request: Request,
    next: Next,
) -> Response {
    let ip = extract_client_ip(&request);

    match limiter.check(ip).await {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

/// Global (non-keyed) rate limit middleware for use with `from_fn`.
pub async fn global_rate_limit(
    limiter: SharedRateLimiter,
    request: Request,
    next: Next,
) -> Response {
    match limiter.check() {
        Ok(_) => next.run(request).await,
        Err(_) => RateLimitError.into_response(),
    }
}

// ---------------------------------------------------------------------------
// Pre-configured rate limiter presets
// ---------------------------------------------------------------------------

pub struct RateLimitPresets;

impl RateLimitPresets {
    /// General REST surface: 120 requests/minute per IP.
    pub fn api() -> PerIpRateLimiter {
        PerIpRateLimiter::new(120, Duration::from_secs(600))
    }

    /// WebSocket upgrade attempts: capped tighter than the REST surface since
    /// a single connection stays open and the per-message limiter takes over
    /// after the handshake.
    pub fn websocket_handshake() -> PerIpRateLimiter {
        PerIpRateLimiter::new(30, Duration::from_secs(600))
    }

    /// Lock CRUD: 30 requests/minute per IP.
    pub fn locks() -> PerIpRateLimiter {
        PerIpRateLimiter::new(30, Duration::from_secs(600))
    }
}
