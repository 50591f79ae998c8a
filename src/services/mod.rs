pub mod cache_service;
pub mod persistence;

pub use cache_service::CacheService;
pub use persistence::{PgPersistence, Persistence};
