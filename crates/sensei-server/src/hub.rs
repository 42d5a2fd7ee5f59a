//! Connection hub: fan-out of [`ServerMessage`]s to connected WebSocket
//! clients.
//!
//! Each client owns a bounded mpsc queue drained by its writer task.
//! Delivery failure (closed or full queue) is treated as a dead connection
//! and evicts the client; broadcast iterates a snapshot of the membership
//! so eviction mid-broadcast never skips or aborts remaining deliveries.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use sensei_core::{ClientId, ServerMessage};

const DEFAULT_QUEUE: usize = 64;

pub struct ConnectionHub {
    clients: DashMap<ClientId, mpsc::Sender<ServerMessage>>,
    queue_size: usize,
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE)
    }
}

impl ConnectionHub {
    pub fn new(queue_size: usize) -> Self {
        Self {
            clients: DashMap::new(),
            queue_size,
        }
    }

    /// Register a new client. Returns its id and the queue its writer
    /// task drains.
    pub fn connect(&self) -> (ClientId, mpsc::Receiver<ServerMessage>) {
        let id = ClientId::new();
        let (tx, rx) = mpsc::channel(self.queue_size);
        self.clients.insert(id.clone(), tx);
        info!(client_id = %id, connections = self.clients.len(), "client connected");
        (id, rx)
    }

    /// Idempotent removal.
    pub fn disconnect(&self, id: &ClientId) {
        if self.clients.remove(id).is_some() {
            info!(client_id = %id, connections = self.clients.len(), "client disconnected");
        }
    }

    pub fn count(&self) -> usize {
        self.clients.len()
    }

    /// Deliver to one client. A closed or full queue means the connection
    /// is dead or hopelessly backed up; either way the client is evicted.
    pub fn send(&self, id: &ClientId, message: ServerMessage) -> bool {
        let Some(entry) = self.clients.get(id) else {
            debug!(client_id = %id, "send to unknown client dropped");
            return false;
        };
        let tx = entry.value().clone();
        drop(entry);

        match tx.try_send(message) {
            Ok(()) => true,
            Err(err) => {
                warn!(client_id = %id, error = %err, "delivery failed, evicting client");
                self.disconnect(id);
                false
            }
        }
    }

    /// Deliver to every client connected at the start of the call.
    /// Returns the number of successful deliveries.
    pub fn broadcast(&self, message: &ServerMessage) -> usize {
        let ids: Vec<ClientId> = self.clients.iter().map(|e| e.key().clone()).collect();
        let mut delivered = 0;
        for id in ids {
            if self.send(&id, message.clone()) {
                delivered += 1;
            }
        }
        debug!(
            message_type = message.message_type(),
            delivered, "broadcast complete"
        );
        delivered
    }
}
