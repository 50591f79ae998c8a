use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::{error::ApiError, models::RegionLock, utils::validation::is_valid_rectangle, AppState};

#[derive(Deserialize)]
pub struct CreateLockRequest {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
    pub locked_by: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// `GET /locks` — every active region lock.
pub async fn list_locks(State(state): State<AppState>) -> Json<Vec<RegionLock>> {
    Json(state.core.lock_index.list().await)
}

/// `POST /locks` — add a region lock. Rejects degenerate or out-of-bounds
/// rectangles; overlapping an existing lock is allowed (last write wins on
/// the overlapping area, matching `LockIndex::is_locked`'s any-match check).
pub async fn create_lock(
    State(state): State<AppState>,
    Json(request): Json<CreateLockRequest>,
) -> Result<Json<RegionLock>, ApiError> {
    if !is_valid_rectangle(
        request.x1,
        request.y1,
        request.x2,
        request.y2,
        state.settings.canvas.width,
        state.settings.canvas.height,
    ) {
        return Err(ApiError::BadRequest("invalid lock rectangle".to_string()));
    }

    let lock = RegionLock {
        x1: request.x1,
        y1: request.y1,
        x2: request.x2,
        y2: request.y2,
        locked_by: request.locked_by,
        reason: request.reason,
        created_at: Utc::now(),
    };

    state
        .core
        .lock_index
        .put(lock.clone())
        .await
        .map_err(|_| ApiError::PersistenceUnavailable)?;

    Ok(Json(lock))
}

/// `DELETE /locks/:x1/:y1/:x2/:y2` — remove a lock by its rectangle identity.
pub async fn delete_lock(
    State(state): State<AppState>,
    Path((x1, y1, x2, y2)): Path<(u32, u32, u32, u32)>,
) -> Result<(), ApiError> {
    state
        .core
        .lock_index
        .remove(x1, y1, x2, y2)
        .await
        .map_err(|_| ApiError::PersistenceUnavailable)
}
