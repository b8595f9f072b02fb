//! Shutdown coordination via `CancellationToken`.
//!
//! One coordinator per server. The token is cloned into the accept loop and
//! every connection task; cancelling it stops accepting and lets each
//! session close its socket and remove itself from the registry.

use tokio_util::sync::CancellationToken;

/// Coordinates shutdown across the accept loop and connection tasks.
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// A clone of the cancellation token for a task to watch.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Initiate shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
