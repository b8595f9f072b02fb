//! Notification fan-out from the CRUD layer to connected clients.
//!
//! Delivery is best-effort: no acknowledgement, no retry, no persistence.
//! A subject with no live connections simply receives nothing; the CRUD
//! layer's durable data is the source of truth and clients reconcile on
//! their next read.

use std::sync::Arc;

use taskwire_core::events::DomainEvent;
use taskwire_core::protocol::ServerFrame;
use tracing::{debug, warn};

use crate::ws::registry::SessionRegistry;

/// Resolves domain events into room-targeted sends.
pub struct NotificationDispatcher {
    registry: Arc<SessionRegistry>,
}

impl NotificationDispatcher {
    /// Create a dispatcher over the given registry.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Publish a domain event to every connection of every target subject.
    ///
    /// The frame is serialized once. Target resolution snapshots the
    /// registry per subject and all sends happen outside the registry lock;
    /// a failed send to one connection never aborts delivery to the rest.
    ///
    /// Returns the number of connections the event was enqueued to.
    pub fn publish(&self, event: &DomainEvent) -> usize {
        let frame = ServerFrame::event(&event.event);
        let json = match serde_json::to_string(&frame) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(kind = event.event.kind(), error = %e, "failed to serialize event");
                return 0;
            }
        };

        let mut delivered = 0;
        for user in &event.target_user_ids {
            let targets = self.registry.targets(user);
            if targets.is_empty() {
                // expected no-op: the subject is offline
                debug!(kind = event.event.kind(), user_id = %user, "no live connections for target");
                continue;
            }
            for conn in targets {
                if conn.send(Arc::clone(&json)) {
                    delivered += 1;
                } else {
                    warn!(conn_id = %conn.id, user_id = %user, "failed to enqueue event for connection");
                }
            }
        }
        debug!(kind = event.event.kind(), delivered, "published event");
        delivered
    }
}
