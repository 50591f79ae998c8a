use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
};

use crate::{canvas, AppState};

/// Upgrade to a WebSocket and hand the split socket to the IngressHandler.
/// Everything past this point — decoding, rate limiting, lock checks,
/// batching — lives in `canvas::ingress`.
pub async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let core = state.core.clone();
    let width = state.settings.canvas.width;
    let height = state.settings.canvas.height;
    ws.on_upgrade(move |socket| canvas::ingress::run(socket, core, width, height))
}
