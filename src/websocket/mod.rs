//! WebSocket Broadcast Relay
//!
//! Every message a connected peer sends is relayed to every connected peer.
//!
//! ## Architecture
//!
//! - **Hub**: Single control loop owning membership and fan-out
//! - **Connection**: Reader and writer pumps bridging one transport to the hub
//! - **Transport**: The stream/sink boundary a connection is built on
//! - **Handler**: Axum upgrade entry point for `/ws`
//! - **Messages**: Payloads and the hub's synthetic notifications
//!
//! ## Backpressure
//!
//! Each connection has a bounded outbound queue. The hub never waits on a
//! queue: a peer whose queue is full when a message arrives is evicted.
//!
//! ## Example
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket('ws://localhost:8080/ws');
//!
//! ws.onmessage = (event) => console.log('Received:', event.data);
//! ws.onopen = () => ws.send('hello');
//! ```

mod connection;
mod handler;
mod hub;
mod messages;
mod transport;

pub use connection::{Connection, Teardown};
pub use handler::websocket_handler;
pub use hub::{ConnectionId, Delivery, Hub, HubConfig, HubError, HubHandle, Member, Registry};
pub use messages::{Inbound, Notification, Payload};
pub use transport::{MessageSink, MessageStream, TransportError};
