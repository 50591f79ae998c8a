use std::io::Cursor;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use image::{ImageFormat, RgbImage};
use serde::Serialize;

use crate::{error::ApiError, services::cache_service::keys, AppState};

#[derive(Serialize)]
pub struct CanvasSnapshotResponse {
    width: u32,
    height: u32,
    bitmap: String,
    hash: String,
    last_updated: DateTime<Utc>,
}

async fn load_snapshot(state: &AppState) -> Result<crate::models::Canvas, ApiError> {
    if let Some(canvas) = state.cache.get_canvas(&keys::canvas_state()).await {
        return Ok(canvas);
    }
    state
        .persistence
        .load_canvas(
            state.settings.canvas.width,
            state.settings.canvas.height,
            state.settings.canvas.empty_fill,
        )
        .await
        .map_err(|_| ApiError::PersistenceUnavailable)
}

/// `GET /canvas` — JSON snapshot with the bitmap base64-encoded.
pub async fn snapshot(State(state): State<AppState>) -> Result<Json<CanvasSnapshotResponse>, ApiError> {
    let canvas = load_snapshot(&state).await?;
    Ok(Json(CanvasSnapshotResponse {
        width: canvas.width,
        height: canvas.height,
        bitmap: STANDARD.encode(&canvas.bitmap),
        hash: canvas.hash,
        last_updated: canvas.last_updated,
    }))
}

/// `GET /canvas/image` — the current bitmap rendered to PNG.
pub async fn image(State(state): State<AppState>) -> Result<Response, ApiError> {
    let canvas = load_snapshot(&state).await?;
    let rgb = RgbImage::from_raw(canvas.width, canvas.height, canvas.bitmap)
        .ok_or_else(|| ApiError::BadRequest("canvas bitmap does not match its declared dimensions".to_string()))?;

    let mut bytes = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(rgb).write_to(&mut bytes, ImageFormat::Png)?;

    Ok(([(header::CONTENT_TYPE, "image/png")], bytes.into_inner()).into_response())
}
