//! Per-connection state owned by the gateway.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use taskwire_core::ids::{ConnectionId, UserId};
use taskwire_core::protocol::ServerFrame;
use tokio::sync::mpsc;

/// A connected WebSocket client.
///
/// Owned by the gateway session task; the registry and dispatcher hold
/// `Arc` references. The subject field is written only by the registry so
/// that room membership and authentication state change together.
pub struct ClientConnection {
    /// Identifier assigned at accept time, stable for the connection's life.
    pub id: ConnectionId,
    /// Subject this connection is authenticated as, if any.
    subject: Mutex<Option<UserId>>,
    /// Bounded channel to the connection's WebSocket write task.
    tx: mpsc::Sender<Arc<String>>,
    /// When the connection was accepted.
    pub connected_at: Instant,
    /// Whether the client answered the last Ping.
    pub is_alive: AtomicBool,
    /// When the last Pong was received.
    last_pong: Mutex<Instant>,
    /// Messages dropped because the outbound buffer was full or closed.
    pub dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a new connection around its outbound channel.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            subject: Mutex::new(None),
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// The subject this connection is currently authenticated as.
    pub fn subject(&self) -> Option<UserId> {
        self.subject.lock().clone()
    }

    /// Whether the connection has authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.subject.lock().is_some()
    }

    /// Set or clear the authenticated subject. Registry-internal: callers
    /// go through `SessionRegistry` so membership stays consistent.
    pub(crate) fn set_subject(&self, subject: Option<UserId>) {
        *self.subject.lock() = subject;
    }

    /// Enqueue a serialized frame for this connection.
    ///
    /// Non-blocking and best-effort: returns `false` if the outbound buffer
    /// is full or the connection is gone, incrementing the drop counter.
    pub fn send(&self, message: Arc<String>) -> bool {
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize and enqueue a protocol frame.
    pub fn send_frame(&self, frame: &ServerFrame) -> bool {
        match serde_json::to_string(frame) {
            Ok(json) => self.send(Arc::new(json)),
            Err(_) => false,
        }
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record a Pong (or equivalent activity) from the client.
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Duration since the last Pong (or accept).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Check and reset the alive flag for the heartbeat loop.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }
}
