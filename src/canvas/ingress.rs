use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};

use crate::{
    canvas::{
        batcher::{QueuedEdit, SubmitOutcome},
        lifecycle::CanvasCore,
    },
    models::{InboundMessage, OutboundMessage, PixelEdit, PixelUpdateData, Tool},
    utils::validation::is_in_bounds,
};
use std::sync::Arc;

const ANONYMOUS_USER: &str = "anonymous";

/// Per-connection decoder. One instance per accepted WebSocket; all
/// instances share the single `CanvasCore` (Batcher, Broadcaster, limiters,
/// LockIndex). Never blocks the Broadcaster: every outbound write for this
/// connection goes through its Subscriber queue via `broadcaster.send_to`,
/// which is non-blocking.
pub async fn run(socket: WebSocket, core: Arc<CanvasCore>, canvas_width: u32, canvas_height: u32) {
    let (mut sender, mut receiver) = socket.split();
    let (subscriber_id, mut outbound_rx) = core.broadcaster.register().await;

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if sender.send(frame).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    while let Some(frame) = receiver.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(error = %err, "websocket read error, closing connection");
                break;
            }
        };

        match frame {
            Message::Text(text) => handle_text(&text, &core, subscriber_id, canvas_width, canvas_height).await,
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => {}
        }
    }

    core.broadcaster.deregister(subscriber_id).await;
    let _ = writer.await;
}

async fn handle_text(
    text: &str,
    core: &Arc<CanvasCore>,
    subscriber_id: uuid::Uuid,
    canvas_width: u32,
    canvas_height: u32,
) {
    let message: InboundMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(_) => {
            let reject = OutboundMessage::reject("invalid", None, None);
            core.broadcaster.send_to(subscriber_id, &reject).await;
            return;
        }
    };

    match message {
        InboundMessage::Heartbeat => {
            let ack = OutboundMessage::HeartbeatAck {
                timestamp: chrono::Utc::now(),
            };
            core.broadcaster.send_to(subscriber_id, &ack).await;
        }
        InboundMessage::PixelUpdate { data } => {
            handle_pixel_update(data, core, subscriber_id, canvas_width, canvas_height).await;
        }
        InboundMessage::Unknown => {}
    }
}

async fn handle_pixel_update(
    data: PixelUpdateData,
    core: &Arc<CanvasCore>,
    subscriber_id: uuid::Uuid,
    canvas_width: u32,
    canvas_height: u32,
) {
    let edit = match validate(&data, canvas_width, canvas_height) {
        Some(edit) => edit,
        None => {
            let reject = OutboundMessage::reject("invalid", None, None);
            core.broadcaster.send_to(subscriber_id, &reject).await;
            return;
        }
    };

    let limiter_key = edit.user_id.as_deref().unwrap_or(ANONYMOUS_USER);
    if let Err(reason) = core.admit(limiter_key).await {
        let reject = OutboundMessage::reject(reason, Some(edit.x), Some(edit.y));
        core.broadcaster.send_to(subscriber_id, &reject).await;
        return;
    }

    if core.lock_index.is_locked(edit.x, edit.y).await {
        let reject = OutboundMessage::reject("Position locked", Some(edit.x), Some(edit.y));
        core.broadcaster.send_to(subscriber_id, &reject).await;
        return;
    }

    let queued = QueuedEdit::new(edit, Some(subscriber_id));
    if let SubmitOutcome::Overloaded = core.submit(queued).await {
        tracing::debug!("edit rejected: batcher overloaded");
    }
}

/// Structural validation for an inbound `pixel:update`: bounds, color
/// format, and tool name. Rejects (`None`) rather than panicking on any
/// malformed field — the token bucket and lock check come later.
fn validate(data: &PixelUpdateData, canvas_width: u32, canvas_height: u32) -> Option<PixelEdit> {
    if data.x < 0 || data.y < 0 {
        return None;
    }
    let (x, y) = (data.x as u32, data.y as u32);
    if !is_in_bounds(x, y, canvas_width, canvas_height) {
        return None;
    }
    if crate::models::parse_hex_color(&data.color).is_none() {
        return None;
    }
    let tool = match data.tool.as_deref() {
        Some("brush") | None => Tool::Brush,
        Some("eraser") => Tool::Eraser,
        Some(_) => return None,
    };

    Some(PixelEdit {
        x,
        y,
        color: data.color.clone(),
        tool,
        client_timestamp: data.client_timestamp,
        user_id: data.user_id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(x: i64, y: i64, color: &str, tool: Option<&str>) -> PixelUpdateData {
        PixelUpdateData {
            x,
            y,
            color: color.to_string(),
            tool: tool.map(str::to_string),
            client_timestamp: chrono::Utc::now(),
            user_id: None,
        }
    }

    #[test]
    fn validate_accepts_in_bounds_brush_edit() {
        let edit = validate(&data(5, 5, "#FF0000", Some("brush")), 900, 900).unwrap();
        assert_eq!((edit.x, edit.y), (5, 5));
        assert_eq!(edit.tool, Tool::Brush);
    }

    #[test]
    fn validate_defaults_missing_tool_to_brush() {
        let edit = validate(&data(0, 0, "#000000", None), 900, 900).unwrap();
        assert_eq!(edit.tool, Tool::Brush);
    }

    #[test]
    fn validate_rejects_out_of_bounds() {
        assert!(validate(&data(900, 0, "#FFFFFF", None), 900, 900).is_none());
        assert!(validate(&data(-1, 0, "#FFFFFF", None), 900, 900).is_none());
    }

    #[test]
    fn validate_rejects_malformed_color() {
        assert!(validate(&data(0, 0, "red", None), 900, 900).is_none());
        assert!(validate(&data(0, 0, "#GGGGGG", None), 900, 900).is_none());
    }

    #[test]
    fn validate_rejects_unknown_tool() {
        assert!(validate(&data(0, 0, "#FFFFFF", Some("bucket")), 900, 900).is_none());
    }
}
