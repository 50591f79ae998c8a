use axum::Json;

use crate::models::Palette;

/// `GET /palette` — the static color palette. Not user-editable; this is
/// the only touchpoint the server has with it.
pub async fn get_palette() -> Json<Palette> {
    Json(Palette::default())
}
