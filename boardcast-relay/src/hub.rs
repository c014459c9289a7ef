//! Connection registry and fan-out broadcast.
//!
//! The [`Hub`] owns the set of open connections. Every connection gets a
//! bounded outbound queue; the WebSocket writer task for that connection
//! drains it. Broadcasting enqueues a clone of the message on every queue
//! except the sender's.
//!
//! Delivery is best-effort. There are no retries, no acknowledgments and no
//! storage: a peer that is not connected when a message is broadcast never
//! sees it, and a peer whose queue is full loses that message (the newest
//! one is dropped, for that peer only). A slow peer therefore costs itself
//! messages instead of stalling the sender or anyone else.

use std::collections::HashMap;
use std::fmt;

use axum::extract::ws::Message;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

/// Default capacity of each connection's outbound queue.
pub const DEFAULT_PEER_BUFFER: usize = 256;

/// Identity of one open connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a single [`Hub::broadcast`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Peers whose queue accepted the message.
    pub delivered: usize,
    /// Peers skipped because their queue was full.
    pub dropped_full: usize,
    /// Peers skipped because their writer had already gone away.
    pub dropped_closed: usize,
}

impl BroadcastReport {
    /// Total number of peers that did not get the message.
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.dropped_full + self.dropped_closed
    }
}

/// Registry of open connections.
///
/// All access goes through a single [`RwLock`]. Broadcast holds the read
/// lock while it enqueues, and enqueueing never waits, so the lock is never
/// held across an `.await`. A connection removed by [`Hub::disconnect`] is
/// therefore never sent to afterwards, and a connection inserted by
/// [`Hub::accept`] sees every broadcast that starts after `accept` returns.
pub struct Hub {
    connections: RwLock<HashMap<ConnectionId, mpsc::Sender<Message>>>,
    peer_buffer: usize,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    /// Creates an empty hub with the default per-peer queue capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_peer_buffer(DEFAULT_PEER_BUFFER)
    }

    /// Creates an empty hub with a custom per-peer queue capacity.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn with_peer_buffer(peer_buffer: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            peer_buffer: peer_buffer.max(1),
        }
    }

    /// Registers a new connection.
    ///
    /// Returns the connection's id and the receiving half of its outbound
    /// queue. The caller must drain the receiver onto the socket.
    pub fn accept(&self) -> (ConnectionId, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(self.peer_buffer);
        let id = ConnectionId::generate();
        self.connections.write().insert(id, tx);
        (id, rx)
    }

    /// Forwards `msg` to every registered connection except `origin`.
    ///
    /// Nothing is sent if `origin` is no longer registered. A failure for one
    /// peer does not affect the others.
    pub fn broadcast(&self, origin: ConnectionId, msg: &Message) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let conns = self.connections.read();
        if !conns.contains_key(&origin) {
            tracing::debug!(conn_id = %origin, "origin already closed, not broadcasting");
            return report;
        }
        for (id, tx) in conns.iter().filter(|(id, _)| **id != origin) {
            match tx.try_send(msg.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(conn_id = %id, from = %origin, "peer queue full, dropping message");
                    report.dropped_full += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(conn_id = %id, from = %origin, "peer writer gone, skipping");
                    report.dropped_closed += 1;
                }
            }
        }
        drop(conns);
        report
    }

    /// Removes a connection from the registry.
    ///
    /// Returns `false` if the connection was not registered; removing twice
    /// is harmless.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.write().remove(&id).is_some()
    }

    /// Returns whether `id` is currently registered.
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().contains_key(&id)
    }

    /// Number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Returns `true` if no connections are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Empties the registry, asking every connection to close.
    ///
    /// Each writer gets a Close frame if its queue has room; either way its
    /// queue is closed, so the writer stops once the queue is drained.
    /// Returns the number of connections that were registered.
    pub fn close_all(&self) -> usize {
        let drained: Vec<_> = self.connections.write().drain().collect();
        for (id, tx) in &drained {
            tracing::info!(conn_id = %id, "closing connection");
            match tx.try_send(Message::Close(None)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(conn_id = %id, "peer queue full, closing without Close frame");
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(conn_id = %id, "peer writer already gone");
                }
            }
        }
        drained.len()
    }
}
