use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Append-only audit record for one applied pixel edit.
///
/// The source system writes one of these per pixel even inside large
/// batches; we keep that contract (spec requires it) but it is a known
/// throughput bottleneck for very large batches — see DESIGN.md.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
    pub action: String,
    pub details: AuditDetails,
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditDetails {
    pub x: u32,
    pub y: u32,
    pub color: String,
    pub tool: String,
}

impl AuditEntry {
    pub fn pixel_update(edit: &crate::models::PixelEdit, ip: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            user_id: edit.user_id.clone(),
            action: "pixel_update".to_string(),
            details: AuditDetails {
                x: edit.x,
                y: edit.y,
                color: edit.color.clone(),
                tool: match edit.tool {
                    crate::models::Tool::Brush => "brush".to_string(),
                    crate::models::Tool::Eraser => "eraser".to_string(),
                },
            },
            ip,
        }
    }
}
