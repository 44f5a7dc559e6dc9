//! WebSocket Message Types
//!
//! Defines the payloads relayed between peers and the synthetic
//! notifications the hub emits on membership changes.

use std::fmt;
use std::sync::Arc;

use super::hub::ConnectionId;

/// An immutable relayed message
///
/// Cloning shares the underlying buffer, so fanning one message out to
/// every member never copies the bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Payload(Arc<[u8]>);

impl Payload {
    /// Raw message bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The message as text, if it is valid UTF-8
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => write!(f, "Payload({:?})", text),
            None => write!(f, "Payload({} bytes)", self.0.len()),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self(Arc::from(text.into_bytes()))
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self(Arc::from(text.as_bytes()))
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Arc::from(bytes))
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self(Arc::from(bytes))
    }
}

/// Synthetic messages broadcast by the hub itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// A peer joined the hub
    PeerConnected,
    /// A peer left or was evicted
    PeerDisconnected,
}

impl Notification {
    /// Literal wire text of the notification
    pub fn as_str(&self) -> &'static str {
        match self {
            Notification::PeerConnected => "Peer Connected",
            Notification::PeerDisconnected => "Peer Disconnected",
        }
    }

    pub fn payload(&self) -> Payload {
        Payload::from(self.as_str())
    }
}

/// One item on the hub's intake channel
#[derive(Debug, Clone)]
pub struct Inbound {
    /// Publishing connection, `None` for server-originated messages
    pub from: Option<ConnectionId>,
    /// The message to fan out
    pub payload: Payload,
}

impl Inbound {
    /// A message published by a connected peer
    pub fn from_peer(id: ConnectionId, payload: Payload) -> Self {
        Self {
            from: Some(id),
            payload,
        }
    }

    /// A message originated by the hub itself
    pub fn system(notification: Notification) -> Self {
        Self {
            from: None,
            payload: notification.payload(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_literals() {
        assert_eq!(Notification::PeerConnected.as_str(), "Peer Connected");
        assert_eq!(Notification::PeerDisconnected.as_str(), "Peer Disconnected");
        assert_eq!(
            Notification::PeerConnected.payload().as_text(),
            Some("Peer Connected")
        );
    }

    #[test]
    fn test_payload_clone_shares_buffer() {
        let payload = Payload::from("hello");
        let copy = payload.clone();
        assert!(std::ptr::eq(payload.as_bytes(), copy.as_bytes()));
    }

    #[test]
    fn test_payload_binary_is_not_text() {
        let payload = Payload::from(vec![0xff, 0xfe, 0x00]);
        assert_eq!(payload.len(), 3);
        assert!(payload.as_text().is_none());
        assert_eq!(format!("{:?}", payload), "Payload(3 bytes)");
    }

    #[test]
    fn test_system_inbound_has_no_sender() {
        let inbound = Inbound::system(Notification::PeerDisconnected);
        assert!(inbound.from.is_none());
        assert_eq!(inbound.payload.as_text(), Some("Peer Disconnected"));
    }
}
