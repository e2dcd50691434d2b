//! Connection registry and broadcast fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::Message;
use metrics::{counter, gauge};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::metrics::{
    WS_BROADCAST_DROPS_TOTAL, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_FRAMES_BROADCAST_TOTAL,
};

use super::connection::ClientConnection;

/// Lifetime queue-drop budget before a slow client is forcibly removed.
pub(crate) const MAX_TOTAL_DROPS: u64 = 100;

/// The shared set of live connections.
///
/// The hub is the single source of truth for who is connected: a connection
/// appears in the set exactly while its loops may still attempt I/O on it.
/// All mutation and iteration goes through one `RwLock`, held only for the
/// set operation itself — fan-out enqueues are non-blocking `try_send`s,
/// never socket writes.
pub struct Hub {
    /// Live connections indexed by connection ID.
    connections: RwLock<HashMap<String, Arc<ClientConnection>>>,
}

impl Hub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection to the active set.
    ///
    /// Called exactly once per accepted socket; from this point the
    /// connection is a broadcast target.
    pub async fn register(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        debug!(conn_id = %connection.id, "connection registered");
        let _ = conns.insert(connection.id.clone(), connection);
        counter!(WS_CONNECTIONS_TOTAL).increment(1);
        gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
    }

    /// Remove a connection from the active set and signal its close.
    ///
    /// No-op when the connection is already gone, so the read loop and write
    /// loop may both call this on teardown: concurrent calls collapse to one
    /// observable removal plus one close signal. Returns whether this call
    /// performed the removal.
    pub async fn unregister(&self, connection_id: &str) -> bool {
        let removed = {
            let mut conns = self.connections.write().await;
            conns.remove(connection_id)
        };
        match removed {
            Some(conn) => {
                conn.close();
                gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
                debug!(conn_id = %connection_id, "connection unregistered");
                true
            }
            None => false,
        }
    }

    /// Fan one frame out to every connection other than the sender.
    ///
    /// Enqueues onto each target's bounded queue without blocking: one full
    /// queue never stalls the sender's read loop or delivery to the other
    /// targets. A client that exhausts its lifetime drop budget is removed.
    pub async fn broadcast(&self, sender_id: &str, frame: Message) {
        let mut slow = Vec::new();
        {
            let conns = self.connections.read().await;
            let mut recipients = 0u64;
            for conn in conns.values() {
                if conn.id == sender_id {
                    continue;
                }
                if conn.enqueue(frame.clone()) {
                    recipients += 1;
                } else {
                    counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                    let drops = conn.drop_count();
                    if drops >= MAX_TOTAL_DROPS {
                        warn!(conn_id = %conn.id, drops, "removing slow client");
                        slow.push(conn.id.clone());
                    } else {
                        warn!(conn_id = %conn.id, total_drops = drops, "outbound queue full, frame dropped");
                    }
                }
            }
            counter!(WS_FRAMES_BROADCAST_TOTAL).increment(recipients);
            debug!(sender_id, recipients, "broadcast frame");
        }
        for id in &slow {
            let _ = self.unregister(id).await;
        }
    }

    /// Number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Whether a connection is currently registered.
    pub async fn contains(&self, connection_id: &str) -> bool {
        self.connections.read().await.contains_key(connection_id)
    }

    /// Remove and close every connection (process shutdown).
    pub async fn drain(&self) {
        let all: Vec<Arc<ClientConnection>> = {
            let mut conns = self.connections.write().await;
            conns.drain().map(|(_, conn)| conn).collect()
        };
        for conn in &all {
            conn.close();
        }
        gauge!(WS_CONNECTIONS_ACTIVE).set(0.0);
        debug!(count = all.len(), "hub drained");
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
