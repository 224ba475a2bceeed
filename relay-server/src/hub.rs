//! Connection registries and broadcast fan-out.
//!
//! The service keeps two independent registries: signaling peers and
//! detection subscribers. Each registered connection is represented by
//! the sending half of its outbound queue; a paired writer task drains
//! the queue onto the socket, so fan-out never awaits a slow client.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use axum::extract::ws::Message;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Identifier assigned to each accepted connection.
pub type ConnId = u64;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique connection id.
pub fn next_conn_id() -> ConnId {
    NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed)
}

/// A mutex-guarded set of live connections, keyed by connection id.
///
/// A closed outbound queue means the connection's writer is gone, so the
/// entry is evicted on the spot; eviction of one member never aborts
/// delivery to the rest.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<ConnId, UnboundedSender<Message>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. Idempotent: a second register with the same id
    /// keeps the original entry.
    pub fn register(&self, id: ConnId, tx: UnboundedSender<Message>) {
        self.clients.lock().unwrap().entry(id).or_insert(tx);
    }

    /// Remove a connection if present; no-op otherwise.
    pub fn unregister(&self, id: ConnId) {
        self.clients.lock().unwrap().remove(&id);
    }

    pub fn contains(&self, id: ConnId) -> bool {
        self.clients.lock().unwrap().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().unwrap().is_empty()
    }

    /// Deliver `message` to every member except `exclude`.
    ///
    /// Members whose queue has closed are evicted and delivery continues
    /// to the remaining members. Returns the number of successful
    /// deliveries.
    pub fn broadcast(&self, message: &str, exclude: Option<ConnId>) -> usize {
        let mut clients = self.clients.lock().unwrap();
        let mut delivered = 0;
        let mut dead = Vec::new();
        for (&id, tx) in clients.iter() {
            if Some(id) == exclude {
                continue;
            }
            if tx.send(Message::Text(message.to_string())).is_ok() {
                delivered += 1;
            } else {
                dead.push(id);
            }
        }
        for id in dead {
            debug!(conn = id, "evicting closed connection from registry");
            clients.remove(&id);
        }
        delivered
    }
}
