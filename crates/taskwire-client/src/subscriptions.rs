//! Per-kind event subscriptions.
//!
//! Pushed frames are routed to subscribers by frame type. Subscribers that
//! fall behind or drop their receiver are pruned on the next dispatch.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

/// Buffered frames per subscriber before older ones are dropped.
const SUBSCRIBER_BUFFER: usize = 64;

/// Routes pushed frames to per-kind subscriber channels.
#[derive(Default)]
pub struct SubscriptionMap {
    channels: Mutex<HashMap<String, Vec<mpsc::Sender<Value>>>>,
}

impl SubscriptionMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to frames of the given kind (e.g. `task_shared`).
    pub fn subscribe(&self, kind: &str) -> mpsc::Receiver<Value> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.channels
            .lock()
            .entry(kind.to_string())
            .or_default()
            .push(tx);
        rx
    }

    /// Deliver a frame's payload to every live subscriber for its kind.
    ///
    /// Returns how many subscribers received it. Closed and full channels
    /// are dropped from the list.
    pub fn dispatch(&self, kind: &str, payload: &Value) -> usize {
        let mut channels = self.channels.lock();
        let Some(senders) = channels.get_mut(kind) else {
            return 0;
        };

        let mut delivered = 0;
        senders.retain(|tx| match tx.try_send(payload.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(kind, "subscriber buffer full, dropping frame");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        if senders.is_empty() {
            let _ = channels.remove(kind);
        }
        delivered
    }

    /// Number of live subscriber channels across all kinds.
    pub fn subscriber_count(&self) -> usize {
        self.channels.lock().values().map(Vec::len).sum()
    }
}
