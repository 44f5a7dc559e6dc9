//! Transport Boundary
//!
//! The hub never touches sockets directly. A connection is handed two
//! independent halves of an already-upgraded duplex channel: a stream that
//! yields inbound payloads and a sink that accepts outbound ones.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;

use super::messages::Payload;

/// Errors raised by a transport half
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] axum::Error),

    #[error("Transport error: {0}")]
    Other(String),
}

/// Inbound half of a duplex transport
#[async_trait]
pub trait MessageStream: Send + 'static {
    /// Wait for the next message.
    ///
    /// `Ok(None)` means the peer closed the channel cleanly.
    async fn receive_message(&mut self) -> Result<Option<Payload>, TransportError>;
}

/// Outbound half of a duplex transport
#[async_trait]
pub trait MessageSink: Send + 'static {
    async fn send_message(&mut self, payload: Payload) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

#[async_trait]
impl MessageStream for SplitStream<WebSocket> {
    async fn receive_message(&mut self) -> Result<Option<Payload>, TransportError> {
        while let Some(frame) = self.next().await {
            match frame? {
                Message::Text(text) => return Ok(Some(Payload::from(text))),
                Message::Binary(bytes) => return Ok(Some(Payload::from(bytes))),
                // Axum answers pings itself
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(_) => return Ok(None),
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl MessageSink for SplitSink<WebSocket, Message> {
    async fn send_message(&mut self, payload: Payload) -> Result<(), TransportError> {
        SinkExt::send(self, to_message(&payload)).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        SinkExt::close(self).await?;
        Ok(())
    }
}

/// Text when the payload is UTF-8, binary otherwise
fn to_message(payload: &Payload) -> Message {
    match payload.as_text() {
        Some(text) => Message::Text(text.to_owned()),
        None => Message::Binary(payload.as_bytes().to_vec()),
    }
}
