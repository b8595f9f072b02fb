//! Connection lifecycle state machine.
//!
//! Pure and synchronous: a transition takes the current state, an event, and
//! the reconnect policy, and returns the next state plus the effects the
//! controller must perform. The controller owns all I/O and timers; nothing
//! here blocks or spawns.
//!
//! `attempt` counts consecutive failures since the last healthy connection.
//! A dial that fails with `attempt` failures behind it schedules retry
//! number `attempt` (zero-based, used for the backoff delay); a successful
//! connection resets the count.

use taskwire_core::backoff::ReconnectPolicy;
use taskwire_core::protocol::DisconnectReason;

/// Lifecycle state of the gateway connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
    /// Not connected and not trying. Entered on creation, after a
    /// deliberate disconnect, and after retries are exhausted.
    Idle,
    /// A dial is in flight. `attempt` is the number of consecutive
    /// failures that preceded it (0 for a fresh connect).
    Connecting {
        /// Consecutive failures before this dial.
        attempt: u32,
    },
    /// The transport is open.
    Connected {
        /// Whether the gateway has acknowledged our credential.
        authenticated: bool,
    },
    /// Waiting out the backoff delay before retry number `attempt`.
    Reconnecting {
        /// Zero-based retry number, used for the backoff delay.
        attempt: u32,
    },
}

impl ClientState {
    /// Whether the transport is currently open.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

/// Events fed to the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// The caller asked to connect.
    ConnectRequested,
    /// The transport opened.
    TransportOpened,
    /// The dial failed before the transport opened.
    ConnectFailed,
    /// The gateway acknowledged our credential.
    Authenticated,
    /// The gateway rejected our credential. The connection stays open.
    AuthenticationRejected,
    /// The open transport ended.
    ConnectionLost(DisconnectReason),
    /// The backoff timer fired.
    RetryTimerFired,
    /// The caller asked to disconnect (sign-out).
    DisconnectRequested,
}

/// Side effects the controller must perform after a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Dial the gateway.
    OpenTransport,
    /// Close the open transport.
    CloseTransport,
    /// Send an `authenticate` frame with the current credential.
    SendAuthenticate,
    /// Start the backoff timer for the given zero-based retry.
    ScheduleRetry {
        /// Zero-based retry number, input to the delay calculation.
        attempt: u32,
    },
    /// Cancel a pending backoff timer.
    CancelRetry,
    /// Retries are exhausted; the connection is down for good until the
    /// caller reconnects explicitly.
    NotifyExhausted,
}

/// Apply an event to a state, producing the next state and its effects.
///
/// Unexpected event/state pairs are ignored rather than rejected: a late
/// timer or a transport notification that raced a deliberate disconnect
/// leaves the state untouched.
pub fn transition(
    state: ClientState,
    event: ClientEvent,
    policy: &ReconnectPolicy,
) -> (ClientState, Vec<Effect>) {
    use ClientEvent as E;
    use ClientState as S;

    match (state, event) {
        (S::Idle, E::ConnectRequested) => {
            (S::Connecting { attempt: 0 }, vec![Effect::OpenTransport])
        }

        (S::Connecting { .. }, E::TransportOpened) => (
            S::Connected {
                authenticated: false,
            },
            vec![Effect::SendAuthenticate],
        ),
        (S::Connecting { attempt }, E::ConnectFailed) => after_failure(attempt, policy),
        (S::Connecting { .. }, E::DisconnectRequested) => (S::Idle, vec![Effect::CloseTransport]),

        (S::Connected { .. }, E::Authenticated) => (
            S::Connected {
                authenticated: true,
            },
            vec![],
        ),
        (S::Connected { .. }, E::AuthenticationRejected) => (
            S::Connected {
                authenticated: false,
            },
            vec![],
        ),
        (S::Connected { .. }, E::ConnectionLost(reason)) => {
            if reason.is_deliberate() {
                (S::Idle, vec![])
            } else {
                after_failure(0, policy)
            }
        }
        (S::Connected { .. }, E::DisconnectRequested) => (S::Idle, vec![Effect::CloseTransport]),

        (S::Reconnecting { attempt }, E::RetryTimerFired) => (
            S::Connecting {
                attempt: attempt + 1,
            },
            vec![Effect::OpenTransport],
        ),
        (S::Reconnecting { .. }, E::DisconnectRequested) => (S::Idle, vec![Effect::CancelRetry]),

        // late or irrelevant events leave the state alone
        (state, _) => (state, vec![]),
    }
}

/// Shared failure path: schedule the next retry or give up.
fn after_failure(attempt: u32, policy: &ReconnectPolicy) -> (ClientState, Vec<Effect>) {
    if policy.allows(attempt) {
        (
            ClientState::Reconnecting { attempt },
            vec![Effect::ScheduleRetry { attempt }],
        )
    } else {
        (ClientState::Idle, vec![Effect::NotifyExhausted])
    }
}
