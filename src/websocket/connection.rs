//! Connection Pumps
//!
//! Bridges one peer's transport to the hub. Each connection runs two
//! independent pumps: the reader forwards inbound messages to the hub's
//! intake, the writer drains the connection's outbound queue onto the
//! transport. Whichever side stops first raises the shared [`Teardown`]
//! flag and the other side follows.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use super::hub::{ConnectionId, HubHandle, Member};
use super::messages::Payload;
use super::transport::{MessageSink, MessageStream};

/// How long a closing handshake may take before the sink is dropped anyway
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Close-at-most-once flag shared by a connection's pumps and the hub
#[derive(Clone)]
pub struct Teardown {
    flag: Arc<watch::Sender<bool>>,
}

impl Teardown {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
        }
    }

    /// Raise the flag. Returns true only for the caller that raised it.
    pub fn trigger(&self) -> bool {
        self.flag.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }

    pub fn is_triggered(&self) -> bool {
        *self.flag.borrow()
    }

    /// Resolves once the flag has been raised
    pub async fn triggered(&self) {
        let mut rx = self.flag.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl Default for Teardown {
    fn default() -> Self {
        Self::new()
    }
}

/// One peer session
pub struct Connection<S, R> {
    id: ConnectionId,
    sink: S,
    stream: R,
    outbound_tx: mpsc::Sender<Payload>,
    outbound_rx: mpsc::Receiver<Payload>,
    teardown: Teardown,
    hub: HubHandle,
}

impl<S, R> Connection<S, R>
where
    S: MessageSink,
    R: MessageStream,
{
    /// Wrap an accepted transport, sizing its outbound queue from the hub config
    pub fn new(sink: S, stream: R, hub: HubHandle) -> Self {
        let capacity = hub.outbound_capacity();
        Self::with_capacity(sink, stream, hub, capacity)
    }

    pub fn with_capacity(sink: S, stream: R, hub: HubHandle, capacity: usize) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity.max(1));
        Self {
            id: Uuid::new_v4(),
            sink,
            stream,
            outbound_tx,
            outbound_rx,
            teardown: Teardown::new(),
            hub,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Join the hub and pump messages until the connection ends.
    ///
    /// The writer runs on its own task, the reader on this one. On return
    /// the connection has left the hub and its transport is closed.
    pub async fn run(self) -> ConnectionId {
        let Connection {
            id,
            mut sink,
            stream,
            outbound_tx,
            outbound_rx,
            teardown,
            hub,
        } = self;

        // The hub holds the only queue sender from here on
        if hub
            .join(Member::new(id, outbound_tx, teardown.clone()))
            .is_err()
        {
            tracing::error!(connection_id = %id, "Hub unavailable, dropping connection");
            close_sink(id, &mut sink).await;
            return id;
        }
        tracing::info!(connection_id = %id, "WebSocket connected");

        let writer = tokio::spawn(write_pump(id, sink, outbound_rx, teardown.clone()));

        read_pump(id, stream, &hub, &teardown).await;

        teardown.trigger();
        hub.leave(id);

        if let Err(e) = writer.await {
            tracing::error!(connection_id = %id, error = %e, "Writer task failed");
        }

        tracing::info!(connection_id = %id, "WebSocket disconnected");
        id
    }
}

/// Forward inbound messages to the hub until the transport fails or the
/// connection is torn down.
async fn read_pump<R: MessageStream>(
    id: ConnectionId,
    mut stream: R,
    hub: &HubHandle,
    teardown: &Teardown,
) {
    loop {
        let received = tokio::select! {
            biased;
            _ = teardown.triggered() => break,
            received = stream.receive_message() => received,
        };

        let payload = match received {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                tracing::debug!(connection_id = %id, "Peer closed connection");
                break;
            }
            Err(e) => {
                tracing::debug!(connection_id = %id, error = %e, "WebSocket receive error");
                break;
            }
        };

        let published = tokio::select! {
            biased;
            _ = teardown.triggered() => break,
            published = hub.publish(id, payload) => published,
        };
        if published.is_err() {
            tracing::debug!(connection_id = %id, "Hub stopped, ending reader");
            break;
        }
    }

    if teardown.trigger() {
        tracing::debug!(connection_id = %id, "Reader initiated teardown");
    }
}

/// Drain the outbound queue onto the transport, then close it.
///
/// The sink is dropped on return, so the transport goes away even when the
/// closing handshake could not be sent.
async fn write_pump<S: MessageSink>(
    id: ConnectionId,
    mut sink: S,
    mut outbound: mpsc::Receiver<Payload>,
    teardown: Teardown,
) {
    loop {
        let payload = tokio::select! {
            biased;
            _ = teardown.triggered() => break,
            payload = outbound.recv() => match payload {
                Some(payload) => payload,
                None => break,
            },
        };

        let sent = tokio::select! {
            biased;
            _ = teardown.triggered() => break,
            sent = sink.send_message(payload) => sent,
        };
        if let Err(e) = sent {
            tracing::debug!(connection_id = %id, error = %e, "WebSocket send failed");
            break;
        }
    }

    if teardown.trigger() {
        tracing::debug!(connection_id = %id, "Writer initiated teardown");
    }

    close_sink(id, &mut sink).await;
}

/// Attempt a graceful close, bounded by [`CLOSE_GRACE`].
///
/// A peer that stopped reading can leave the close blocked on a full send
/// buffer; past the grace period the caller just drops the sink.
async fn close_sink<S: MessageSink>(id: ConnectionId, sink: &mut S) {
    match tokio::time::timeout(CLOSE_GRACE, sink.close()).await {
        Ok(Ok(())) => {}
        // A peer that already went away makes this fail; nothing left to do
        Ok(Err(e)) => {
            tracing::trace!(connection_id = %id, error = %e, "Close after teardown");
        }
        Err(_) => {
            tracing::debug!(connection_id = %id, "Close handshake timed out, dropping transport");
        }
    }
}
