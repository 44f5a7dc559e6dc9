//! WebSocket Connection Hub
//!
//! Owns the set of live connections and fans every accepted message out to
//! them. All membership changes and broadcasts are serialized through one
//! control loop ([`Hub::run`]); everything else talks to it through a
//! [`HubHandle`]. No lock guards the member table because only the loop
//! ever sees it.

use std::collections::{HashMap, VecDeque};

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::connection::Teardown;
use super::messages::{Inbound, Notification, Payload};

/// Unique identifier for a WebSocket connection
pub type ConnectionId = Uuid;

/// Configuration for the connection hub
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Capacity of each connection's outbound queue
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
    /// Capacity of the shared intake channel
    #[serde(default = "default_intake_capacity")]
    pub intake_capacity: usize,
    /// Deliver a message back to the connection that published it
    #[serde(default = "default_echo_to_sender")]
    pub echo_to_sender: bool,
}

fn default_outbound_capacity() -> usize {
    256
}

fn default_intake_capacity() -> usize {
    64
}

fn default_echo_to_sender() -> bool {
    true
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: default_outbound_capacity(),
            intake_capacity: default_intake_capacity(),
            echo_to_sender: default_echo_to_sender(),
        }
    }
}

/// The hub's view of one connection
pub struct Member {
    id: ConnectionId,
    outbound: mpsc::Sender<Payload>,
    teardown: Teardown,
}

impl Member {
    pub fn new(id: ConnectionId, outbound: mpsc::Sender<Payload>, teardown: Teardown) -> Self {
        Self {
            id,
            outbound,
            teardown,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Close the outbound queue and signal the connection to shut down.
    ///
    /// Consumes the member: the queue sender is dropped here and nowhere else.
    fn close(self) {
        self.teardown.trigger();
        drop(self.outbound);
    }
}

/// Outcome of one broadcast
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Members whose queue accepted the message
    pub delivered: usize,
    /// Members evicted while fanning out, including follow-up notifications
    pub evicted: Vec<ConnectionId>,
}

/// Membership table driven by the hub loop
///
/// Not synchronized: exactly one owner mutates it.
pub struct Registry {
    members: HashMap<ConnectionId, Member>,
    echo_to_sender: bool,
}

impl Registry {
    pub fn new(echo_to_sender: bool) -> Self {
        Self {
            members: HashMap::new(),
            echo_to_sender,
        }
    }

    /// Add a member and announce it to everyone, itself included.
    ///
    /// Returns false if the id is already a member.
    pub fn join(&mut self, member: Member) -> bool {
        let id = member.id;
        if self.members.contains_key(&id) {
            tracing::warn!(connection_id = %id, "Duplicate join ignored");
            return false;
        }
        self.members.insert(id, member);
        tracing::info!(connection_id = %id, members = self.members.len(), "Peer joined");

        self.broadcast(&Inbound::system(Notification::PeerConnected));
        true
    }

    /// Remove a member, closing its queue, and announce the departure.
    ///
    /// A no-op returning false if the id is not a member, which covers a
    /// leave that arrives after an eviction.
    pub fn leave(&mut self, id: ConnectionId) -> bool {
        let Some(member) = self.members.remove(&id) else {
            tracing::trace!(connection_id = %id, "Leave for non-member ignored");
            return false;
        };
        member.close();
        tracing::info!(connection_id = %id, members = self.members.len(), "Peer left");

        self.broadcast(&Inbound::system(Notification::PeerDisconnected));
        true
    }

    /// Offer a message to every member without blocking.
    ///
    /// A member whose queue is full (or already closed) is evicted instead
    /// of receiving it. Each eviction queues a "Peer Disconnected"
    /// notification, and those are fanned out here too until no further
    /// evictions happen.
    pub fn broadcast(&mut self, inbound: &Inbound) -> Delivery {
        let (delivered, mut evicted) = self.deliver(inbound);

        let mut pending: VecDeque<Inbound> = evicted
            .iter()
            .map(|_| Inbound::system(Notification::PeerDisconnected))
            .collect();
        while let Some(notice) = pending.pop_front() {
            let (_, more) = self.deliver(&notice);
            for id in more {
                pending.push_back(Inbound::system(Notification::PeerDisconnected));
                evicted.push(id);
            }
        }

        Delivery { delivered, evicted }
    }

    fn deliver(&mut self, inbound: &Inbound) -> (usize, Vec<ConnectionId>) {
        let mut delivered = 0;
        let mut evicted = Vec::new();

        for (id, member) in &self.members {
            if !self.echo_to_sender && inbound.from == Some(*id) {
                continue;
            }
            match member.outbound.try_send(inbound.payload.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        connection_id = %id,
                        "Outbound queue full, evicting unresponsive peer"
                    );
                    evicted.push(*id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(connection_id = %id, "Outbound queue closed, evicting peer");
                    evicted.push(*id);
                }
            }
        }

        for id in &evicted {
            if let Some(member) = self.members.remove(id) {
                member.close();
            }
        }

        (delivered, evicted)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.members.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member ids in sorted order
    pub fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.members.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Close every remaining member without notifications
    fn clear(&mut self) {
        for (_, member) in self.members.drain() {
            member.close();
        }
    }
}

/// The hub control loop
///
/// Created together with its [`HubHandle`] by [`Hub::new`] and driven by
/// [`Hub::run`], usually on its own task.
pub struct Hub {
    registry: Registry,
    join_rx: mpsc::UnboundedReceiver<Member>,
    leave_rx: mpsc::UnboundedReceiver<ConnectionId>,
    intake_rx: mpsc::Receiver<Inbound>,
    query_rx: mpsc::UnboundedReceiver<oneshot::Sender<Vec<ConnectionId>>>,
}

impl Hub {
    pub fn new(config: HubConfig) -> (Self, HubHandle) {
        let (join_tx, join_rx) = mpsc::unbounded_channel();
        let (leave_tx, leave_rx) = mpsc::unbounded_channel();
        let (intake_tx, intake_rx) = mpsc::channel(config.intake_capacity.max(1));
        let (query_tx, query_rx) = mpsc::unbounded_channel();

        let hub = Self {
            registry: Registry::new(config.echo_to_sender),
            join_rx,
            leave_rx,
            intake_rx,
            query_rx,
        };
        let handle = HubHandle {
            join_tx,
            leave_tx,
            intake_tx,
            query_tx,
            outbound_capacity: config.outbound_capacity.max(1),
        };
        (hub, handle)
    }

    /// Process hub events one at a time until every handle is dropped.
    ///
    /// Joins are polled first so that a connection's join is always applied
    /// before any message it publishes afterwards.
    pub async fn run(self) {
        let Hub {
            mut registry,
            mut join_rx,
            mut leave_rx,
            mut intake_rx,
            mut query_rx,
        } = self;

        tracing::info!("Hub control loop started");

        loop {
            // Join and leave always win over intake, so a burst of either can
            // delay queued messages. Accepted: a peer's join is applied before
            // any message it publishes.
            tokio::select! {
                biased;
                Some(member) = join_rx.recv() => {
                    registry.join(member);
                }
                Some(id) = leave_rx.recv() => {
                    registry.leave(id);
                }
                Some(inbound) = intake_rx.recv() => {
                    let delivery = registry.broadcast(&inbound);
                    tracing::trace!(
                        delivered = delivery.delivered,
                        evicted = delivery.evicted.len(),
                        bytes = inbound.payload.len(),
                        "Broadcast message"
                    );
                }
                Some(reply) = query_rx.recv() => {
                    let _ = reply.send(registry.ids());
                }
                else => break,
            }
        }

        registry.clear();
        tracing::info!("Hub control loop stopped");
    }
}

/// Clonable front door to a running hub
#[derive(Clone)]
pub struct HubHandle {
    join_tx: mpsc::UnboundedSender<Member>,
    leave_tx: mpsc::UnboundedSender<ConnectionId>,
    intake_tx: mpsc::Sender<Inbound>,
    query_tx: mpsc::UnboundedSender<oneshot::Sender<Vec<ConnectionId>>>,
    outbound_capacity: usize,
}

impl HubHandle {
    /// Create a hub and run its loop on a new task
    pub fn spawn(config: HubConfig) -> Self {
        let (hub, handle) = Hub::new(config);
        tokio::spawn(hub.run());
        handle
    }

    /// Ask the hub to register a member
    pub fn join(&self, member: Member) -> Result<(), HubError> {
        self.join_tx.send(member).map_err(|_| HubError::Closed)
    }

    /// Ask the hub to deregister a connection
    ///
    /// Safe to call more than once; a stopped hub has nothing left to remove.
    pub fn leave(&self, id: ConnectionId) {
        if self.leave_tx.send(id).is_err() {
            tracing::trace!(connection_id = %id, "Hub stopped before leave");
        }
    }

    /// Hand a peer's message to the hub for fan-out
    ///
    /// Waits while the intake channel is full; never waits on other peers.
    pub async fn publish(&self, from: ConnectionId, payload: Payload) -> Result<(), HubError> {
        self.intake_tx
            .send(Inbound::from_peer(from, payload))
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Broadcast a server-originated message to every member
    pub async fn broadcast(&self, payload: Payload) -> Result<(), HubError> {
        self.intake_tx
            .send(Inbound {
                from: None,
                payload,
            })
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Snapshot of the current member ids, sorted
    pub async fn members(&self) -> Result<Vec<ConnectionId>, HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.query_tx.send(reply_tx).map_err(|_| HubError::Closed)?;
        reply_rx.await.map_err(|_| HubError::Closed)
    }

    pub async fn member_count(&self) -> Result<usize, HubError> {
        Ok(self.members().await?.len())
    }

    /// Capacity to give each new connection's outbound queue
    pub fn outbound_capacity(&self) -> usize {
        self.outbound_capacity
    }
}

/// Errors that can occur talking to the hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Hub is not running")]
    Closed,
}
