use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inbound WebSocket frame, tagged by `type`. Anything that doesn't match a
/// known shape decodes to `Unknown` rather than failing — IngressHandler
/// drops those silently per spec rather than closing the connection.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    #[serde(rename = "pixel:update")]
    PixelUpdate { data: PixelUpdateData },
    #[serde(rename = "heartbeat")]
    Heartbeat,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelUpdateData {
    pub x: i64,
    pub y: i64,
    pub color: String,
    #[serde(default)]
    pub tool: Option<String>,
    pub client_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Outbound WebSocket frame. Serialized once per `Broadcaster::publish` call
/// and fanned out as shared bytes to every subscriber's queue.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "heartbeat:ack")]
    HeartbeatAck { timestamp: DateTime<Utc> },
    #[serde(rename = "pixel:reject")]
    PixelReject { data: PixelRejectData },
    #[serde(rename = "pixel:bulk_update")]
    PixelBulkUpdate {
        data: PixelBulkUpdateData,
        timestamp: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct PixelRejectData {
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PixelBulkUpdateData {
    pub pixels: Vec<AppliedPixel>,
    pub hash: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppliedPixel {
    pub x: u32,
    pub y: u32,
    pub color: String,
}

impl OutboundMessage {
    pub fn reject(reason: impl Into<String>, x: Option<u32>, y: Option<u32>) -> Self {
        OutboundMessage::PixelReject {
            data: PixelRejectData {
                reason: reason.into(),
                timestamp: Utc::now(),
                x,
                y,
            },
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("OutboundMessage always serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_pixel_update() {
        let raw = r#"{"type":"pixel:update","data":{"x":1,"y":2,"color":"#FF0000","tool":"brush","clientTimestamp":"2024-01-01T00:00:00Z","userId":"u1"}}"#;
        let msg: InboundMessage = serde_json::from_str(raw).unwrap();
        match msg {
            InboundMessage::PixelUpdate { data } => {
                assert_eq!(data.x, 1);
                assert_eq!(data.y, 2);
                assert_eq!(data.user_id.as_deref(), Some("u1"));
            }
            _ => panic!("expected PixelUpdate"),
        }
    }

    #[test]
    fn decodes_heartbeat() {
        let raw = r#"{"type":"heartbeat"}"#;
        let msg: InboundMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(msg, InboundMessage::Heartbeat));
    }

    #[test]
    fn unknown_type_does_not_error() {
        let raw = r#"{"type":"frobnicate","data":{}}"#;
        let msg: InboundMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(msg, InboundMessage::Unknown));
    }

    #[test]
    fn reject_serializes_with_tag() {
        let msg = OutboundMessage::reject("Position locked", Some(5), Some(6));
        let json = msg.to_json();
        assert!(json.contains("\"type\":\"pixel:reject\""));
        assert!(json.contains("Position locked"));
    }
}
