use axum::http::{header, Method};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pixelcanvas_server::canvas::CanvasCore;
use pixelcanvas_server::config::{self, Settings};
use pixelcanvas_server::middleware::request_id_middleware;
use pixelcanvas_server::services::{CacheService, PgPersistence};
use pixelcanvas_server::{routes, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pixelcanvas_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Arc::new(Settings::new()?);

    tracing::info!("Starting pixel canvas server...");

    let db = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .min_connections(settings.database.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&settings.database.url)
        .await?;

    tracing::info!("Database connection established");

    config::database::init_schema(&db)
        .await
        .expect("Failed to initialize canvas schema");

    let redis_client = redis::Client::open(settings.redis.url.clone())?;
    let redis = redis_client.get_connection_manager().await?;

    tracing::info!("Redis connection established");

    let cache = CacheService::new(redis.clone());
    let persistence: Arc<dyn pixelcanvas_server::services::Persistence> = Arc::new(PgPersistence::new(db.clone()));

    let core = CanvasCore::start(persistence.clone(), cache.clone(), &settings.canvas).await?;

    tracing::info!(
        width = settings.canvas.width,
        height = settings.canvas.height,
        "Canvas core started"
    );

    let state = AppState {
        db,
        redis,
        settings: settings.clone(),
        cache,
        persistence,
        core: core.clone(),
    };

    let allowed_origins: Vec<axum::http::HeaderValue> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<axum::http::HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin, skipping: {}", origin);
                None
            })
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN]);

    let app = Router::new()
        .nest("/api", routes::api_routes())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server running on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(core))
    .await?;

    Ok(())
}

/// Waits for Ctrl+C, then drives the canvas core's shutdown sequence: stop
/// the flush ticker, run a final flush, wait for the Applier to drain it,
/// close every subscriber with a graceful frame.
async fn shutdown_signal(core: Arc<CanvasCore>) {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl_c");

    tracing::info!("Shutdown signal received, draining canvas core...");
    core.shutdown().await;
    tracing::info!("Canvas core drained, shutting down");
}
