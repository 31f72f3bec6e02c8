//! Fan-out of invalidation events to every connected client.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use metrics::counter;
use parking_lot::RwLock;
use tagcast_core::{ClientId, Envelope, InvalidationMessage};
use tracing::{debug, warn};

use super::connection::ClientConnection;
use crate::metrics::{INVALIDATIONS_BROADCAST_TOTAL, WS_BROADCAST_DROPS_TOTAL};

/// Default lifetime drop count after which a slow client is evicted.
pub const DEFAULT_MAX_DROPS: u64 = 100;

/// Live session handles plus the publish step over them.
///
/// Publishing never awaits: frames are pushed into each session's bounded
/// queue with `try_send`.
pub struct BroadcastManager {
    connections: RwLock<HashMap<ClientId, Arc<ClientConnection>>>,
    max_drops: u64,
}

impl BroadcastManager {
    /// Create an empty manager using [`DEFAULT_MAX_DROPS`].
    pub fn new() -> Self {
        Self::with_max_drops(DEFAULT_MAX_DROPS)
    }

    /// Create an empty manager with a custom eviction threshold.
    pub fn with_max_drops(max_drops: u64) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            max_drops: max_drops.max(1),
        }
    }

    /// Register a session.
    pub fn add(&self, connection: Arc<ClientConnection>) {
        let _ = self
            .connections
            .write()
            .insert(connection.id.clone(), connection);
    }

    /// Deregister a session. Unknown ids are ignored.
    pub fn remove(&self, id: &ClientId) {
        let _ = self.connections.write().remove(id);
    }

    /// Number of registered sessions.
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Send one `invalidate` envelope to every session.
    ///
    /// The envelope is serialized once and the same frame is shared by all
    /// recipients. Returns the number of sessions the frame was queued for.
    pub fn broadcast(&self, message: &InvalidationMessage) -> usize {
        let frame = match Envelope::invalidate(message).and_then(|e| e.to_json()) {
            Ok(json) => Utf8Bytes::from(json),
            Err(e) => {
                warn!(error = %e, "failed to serialize invalidation");
                return 0;
            }
        };
        let delivered = self.send_all(&frame);
        counter!(INVALIDATIONS_BROADCAST_TOTAL).increment(1);
        debug!(
            tags = message.tags.len(),
            has_message = message.toast().is_some(),
            delivered,
            "broadcast invalidation"
        );
        delivered
    }

    /// Queue a pre-serialized frame for every session, evicting slow ones.
    pub fn send_all(&self, frame: &Utf8Bytes) -> usize {
        let mut delivered = 0;
        let mut slow = Vec::new();
        {
            let conns = self.connections.read();
            for conn in conns.values() {
                if conn.send(frame.clone()) {
                    delivered += 1;
                    continue;
                }
                counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                let drops = conn.drop_count();
                if drops >= self.max_drops {
                    warn!(client_id = %conn.id, drops, "evicting slow client");
                    slow.push(Arc::clone(conn));
                } else {
                    warn!(client_id = %conn.id, total_drops = drops, "client queue full, frame dropped");
                }
            }
        }
        if !slow.is_empty() {
            let mut conns = self.connections.write();
            for conn in slow {
                let _ = conns.remove(&conn.id);
                conn.evict();
            }
        }
        delivered
    }
}

impl Default for BroadcastManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagcast_core::Tag;
    use tokio::sync::mpsc;

    fn make_connection(
        id: &str,
        capacity: usize,
    ) -> (Arc<ClientConnection>, mpsc::Receiver<Utf8Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Arc::new(ClientConnection::new(ClientId::from(id), tx)), rx)
    }

    fn hero_updated() -> InvalidationMessage {
        InvalidationMessage::new(vec![Tag::list("Hero")], Some("updated".into()))
    }

    #[test]
    fn add_and_remove() {
        let bm = BroadcastManager::new();
        let (c1, _rx1) = make_connection("c1", 8);
        let (c2, _rx2) = make_connection("c2", 8);
        bm.add(c1);
        bm.add(c2);
        assert_eq!(bm.connection_count(), 2);
        bm.remove(&ClientId::from("c1"));
        assert_eq!(bm.connection_count(), 1);
        bm.remove(&ClientId::from("missing"));
        assert_eq!(bm.connection_count(), 1);
    }

    #[test]
    fn same_id_replaces_connection() {
        let bm = BroadcastManager::new();
        let (c1, _rx1) = make_connection("same", 8);
        let (c2, _rx2) = make_connection("same", 8);
        bm.add(c1);
        bm.add(c2);
        assert_eq!(bm.connection_count(), 1);
    }

    #[test]
    fn broadcast_reaches_every_session_with_same_frame() {
        let bm = BroadcastManager::new();
        let (c1, mut rx1) = make_connection("c1", 8);
        let (c2, mut rx2) = make_connection("c2", 8);
        bm.add(c1);
        bm.add(c2);

        assert_eq!(bm.broadcast(&hero_updated()), 2);

        let f1 = rx1.try_recv().unwrap();
        let f2 = rx2.try_recv().unwrap();
        assert_eq!(f1.as_str().as_ptr(), f2.as_str().as_ptr());

        let parsed: serde_json::Value = serde_json::from_str(&f1).unwrap();
        assert_eq!(parsed["type"], "invalidate");
        assert_eq!(parsed["data"]["tags"][0]["type"], "Hero");
        assert_eq!(parsed["data"]["message"], "updated");
    }

    #[test]
    fn broadcast_with_no_sessions_is_harmless() {
        let bm = BroadcastManager::new();
        assert_eq!(bm.broadcast(&hero_updated()), 0);
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let bm = BroadcastManager::new();
        let (c1, mut rx1) = make_connection("c1", 1);
        bm.add(c1);

        assert_eq!(bm.broadcast(&hero_updated()), 1);
        assert_eq!(bm.broadcast(&hero_updated()), 0);
        assert!(rx1.try_recv().is_ok());
        assert!(rx1.try_recv().is_err());
        assert_eq!(bm.connection_count(), 1);
    }

    #[test]
    fn slow_client_is_evicted_after_max_drops() {
        let bm = BroadcastManager::with_max_drops(2);
        let (slow, _slow_rx) = make_connection("slow", 1);
        let (fast, mut fast_rx) = make_connection("fast", 16);
        let token = slow.eviction_token();
        bm.add(slow);
        bm.add(fast);

        for _ in 0..3 {
            let _ = bm.broadcast(&hero_updated());
        }

        assert_eq!(bm.connection_count(), 1);
        assert!(token.is_cancelled());
        for _ in 0..3 {
            assert!(fast_rx.try_recv().is_ok());
        }
    }
}
