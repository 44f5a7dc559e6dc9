//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and hands the established socket to a
//! [`Connection`].

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
};
use futures_util::StreamExt;
use std::sync::Arc;

use super::connection::Connection;
use crate::api::AppState;

/// WebSocket upgrade handler
///
/// This is the entry point for WebSocket connections. A failed upgrade is
/// answered by axum and never reaches the hub.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| async move {
        let (sink, stream) = socket.split();
        Connection::new(sink, stream, hub).run().await;
    })
}
