use super::{DatabaseConfig, RedisConfig};
use anyhow::Result;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

/// Tuning knobs for the real-time edit pipeline. Every row corresponds to
/// one entry of the configuration table in spec.md §6; each default matches
/// the documented default there.
#[derive(Debug, Clone)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    pub flush_interval_ms: u64,
    pub bucket_capacity: u32,
    pub bucket_refill_per_sec: f64,
    pub minute_window_max: i64,
    pub subscriber_queue_cap: usize,
    pub lock_cache_ttl_sec: u64,
    pub canvas_cache_ttl_sec: u64,
    pub idle_bucket_ttl_sec: u64,
    /// RGB fill of a freshly-initialized (never-persisted) canvas. The
    /// source system zero-initializes (black) while the eraser writes
    /// white — deliberately different colors. Kept configurable rather than
    /// a buried constant per the open question in spec.md §9.
    pub empty_fill: [u8; 3],
    /// Defensive ceiling on a single flush batch; edits beyond it are
    /// rejected as overloaded instead of queued unbounded.
    pub max_batch_size: usize,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub cors: CorsConfig,
    pub canvas: CanvasConfig,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig {
                port: env_parse("PORT", 8080u16),
                host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 20u32),
                min_connections: env_parse("DATABASE_MIN_CONNECTIONS", 5u32),
            },
            redis: RedisConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000,http://localhost".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
            },
            canvas: CanvasConfig {
                width: env_parse("CANVAS_WIDTH", 900u32),
                height: env_parse("CANVAS_HEIGHT", 900u32),
                flush_interval_ms: env_parse("FLUSH_INTERVAL_MS", 50u64),
                bucket_capacity: env_parse("BUCKET_CAPACITY", 20u32),
                bucket_refill_per_sec: env_parse("BUCKET_REFILL_PER_SEC", 10.0f64),
                minute_window_max: env_parse("MINUTE_WINDOW_MAX", 100i64),
                subscriber_queue_cap: env_parse("SUBSCRIBER_QUEUE_CAP", 64usize),
                lock_cache_ttl_sec: env_parse("LOCK_CACHE_TTL_SEC", 300u64),
                canvas_cache_ttl_sec: env_parse("CANVAS_CACHE_TTL_SEC", 3600u64),
                idle_bucket_ttl_sec: env_parse("IDLE_BUCKET_TTL_SEC", 300u64),
                empty_fill: [0, 0, 0],
                max_batch_size: env_parse("MAX_BATCH_SIZE", 100_000usize),
            },
        })
    }
}
