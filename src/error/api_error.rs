use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the thin HTTP surface (snapshot, image, palette, lock
/// CRUD, health). The WebSocket core never raises `ApiError` — ingress and
/// apply-time failures are reported as `pixel:reject` frames, never HTTP
/// status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Internal server error")]
    InternalServerError,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Image encoding error: {0}")]
    ImageError(#[from] image::ImageError),

    /// Persistence is unreachable and the requested read has no cached
    /// fallback available.
    #[error("Canvas storage is temporarily unavailable")]
    PersistenceUnavailable,

    /// A lock CRUD request named a rectangle that conflicts with an
    /// existing one.
    #[error("Lock conflict: {0}")]
    LockConflict(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                "too_many_requests",
                "Rate limit exceeded".to_string(),
            ),
            ApiError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_string(),
            ),
            ApiError::DatabaseError(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "A database error occurred. Please try again later.".to_string(),
                )
            }
            ApiError::RedisError(e) => {
                tracing::error!("Redis error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "cache_error",
                    "Cache error occurred".to_string(),
                )
            }
            ApiError::ImageError(e) => {
                tracing::error!("Image encoding error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "image_error",
                    "Failed to render canvas image".to_string(),
                )
            }
            ApiError::PersistenceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "persistence_unavailable",
                "Canvas storage is temporarily unavailable".to_string(),
            ),
            ApiError::LockConflict(msg) => (StatusCode::CONFLICT, "lock_conflict", msg.clone()),
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Unexpected error: {:?}", err);
        ApiError::InternalServerError
    }
}
