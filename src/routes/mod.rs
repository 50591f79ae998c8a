use axum::{middleware::from_fn, routing::get, Router};

use crate::{
    middleware::{per_ip_rate_limit, RateLimitPresets},
    AppState,
};

pub mod canvas;
pub mod health;
pub mod locks;
pub mod palette;
pub mod ws;

/// Assemble the thin HTTP surface. The WebSocket core (the real work) is
/// reached through a single `GET /ws` upgrade; everything else here is
/// read-mostly CRUD around it. All of it sits behind the blanket per-IP
/// limiter; `/ws` and `/locks` additionally get their own tighter tier, the
/// same two-layer pattern the REST surface uses for its write routes.
pub fn api_routes() -> Router<AppState> {
    let ws_limiter = RateLimitPresets::websocket_handshake();
    let ws_routes = Router::new().route("/ws", get(ws::upgrade)).layer(from_fn(move |req, next| {
        let limiter = ws_limiter.clone();
        async move { per_ip_rate_limit(limiter, req, next).await }
    }));

    let locks_limiter = RateLimitPresets::locks();
    let lock_routes = Router::new()
        .route("/locks", get(locks::list_locks).post(locks::create_lock))
        .route("/locks/{x1}/{y1}/{x2}/{y2}", axum::routing::delete(locks::delete_lock))
        .layer(from_fn(move |req, next| {
            let limiter = locks_limiter.clone();
            async move { per_ip_rate_limit(limiter, req, next).await }
        }));

    let read_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/canvas", get(canvas::snapshot))
        .route("/canvas/image", get(canvas::image))
        .route("/palette", get(palette::get_palette));

    Router::new().merge(ws_routes).merge(lock_routes).merge(read_routes)
}
