//! State of one connected WebSocket client.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::extract::ws::Utf8Bytes;
use parking_lot::Mutex;
use tagcast_core::ClientId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A connected client as seen by the fan-out path.
pub struct ClientConnection {
    /// Server-assigned id.
    pub id: ClientId,
    /// Queue feeding the session's socket writer.
    tx: mpsc::Sender<Utf8Bytes>,
    /// When the session was accepted.
    pub connected_at: Instant,
    /// Set on every Pong, cleared by each heartbeat check.
    is_alive: AtomicBool,
    last_pong: Mutex<Instant>,
    /// Frames dropped because the queue was full or closed.
    dropped_messages: AtomicU64,
    /// Cancelled when the server evicts this client.
    evicted: CancellationToken,
}

impl ClientConnection {
    /// Create a connection writing into `tx`.
    pub fn new(id: ClientId, tx: mpsc::Sender<Utf8Bytes>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            evicted: CancellationToken::new(),
        }
    }

    /// Enqueue a frame without waiting.
    ///
    /// Returns `false` and counts a drop when the queue is full or closed.
    pub fn send(&self, frame: Utf8Bytes) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total frames dropped for this client.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record a Pong (or any other sign of life).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Return whether the client was alive since the last check, and reset.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the last Pong or since connect.
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Ask the session to close.
    pub fn evict(&self) {
        self.evicted.cancel();
    }

    /// Token cancelled on eviction, for the session's select loop.
    pub fn eviction_token(&self) -> CancellationToken {
        self.evicted.clone()
    }
}
