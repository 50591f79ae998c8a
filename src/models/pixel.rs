use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tool used for a `pixel:update` edit. Eraser always writes
/// [`crate::models::canvas::ERASER_COLOR`] regardless of `color`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Brush,
    Eraser,
}

impl Default for Tool {
    fn default() -> Self {
        Tool::Brush
    }
}

/// A single-pixel mutation request, validated at ingress and queued in the
/// Batcher until the next flush. Lives only as long as it takes to get from
/// the socket to the Applier.
#[derive(Debug, Clone)]
pub struct PixelEdit {
    pub x: u32,
    pub y: u32,
    pub color: String,
    pub tool: Tool,
    pub client_timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
}
