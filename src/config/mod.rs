pub mod database;
pub mod redis;
mod settings;

pub use database::DatabaseConfig;
pub use redis::RedisConfig;
pub use settings::{CanvasConfig, ServerConfig, Settings};
