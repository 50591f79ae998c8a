use std::sync::Arc;

pub mod canvas;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use canvas::CanvasCore;
use config::Settings;
use services::{CacheService, Persistence};

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub redis: redis::aio::ConnectionManager,
    pub settings: Arc<Settings>,
    pub cache: CacheService,
    pub persistence: Arc<dyn Persistence>,
    pub core: Arc<CanvasCore>,
}
