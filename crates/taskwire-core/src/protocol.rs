//! WebSocket wire frames exchanged between the gateway and clients.
//!
//! Client-to-server frames are a small tagged enum. Server-to-client frames
//! all share one envelope shape (`type` + `timestamp` + `data`) so clients
//! can dispatch on the type string alone; pushed domain events use their
//! `kind` as the type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::TaskEvent;
use crate::ids::{ConnectionId, UserId};

/// Frame type sent after a successful `authenticate`.
pub const AUTHENTICATED: &str = "authenticated";
/// Frame type sent after a failed `authenticate`. The connection stays open.
pub const AUTHENTICATION_ERROR: &str = "authentication_error";
/// Greeting frame sent once on accept.
pub const CONNECTION_ESTABLISHED: &str = "connection.established";

/// Frames a client may send to the gateway.
///
/// Unknown frame types are ignored server-side; clients may send anything
/// once connected, but only `authenticate` changes server state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Present a bearer credential, at any point while the connection is
    /// open. Repeatable; a later credential may name a different subject.
    Authenticate {
        /// The bearer token.
        token: String,
    },
}

/// Envelope for every server-to-client frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerFrame {
    /// Frame type — a fixed protocol string or a domain-event kind.
    #[serde(rename = "type")]
    pub frame_type: String,
    /// ISO-8601 timestamp.
    pub timestamp: String,
    /// Frame payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ServerFrame {
    fn new(frame_type: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            frame_type: frame_type.into(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            data,
        }
    }

    /// Greeting sent once on accept, carrying the assigned connection id
    /// and whether the handshake credential already authenticated it.
    pub fn connection_established(conn_id: &ConnectionId, authenticated: bool) -> Self {
        Self::new(
            CONNECTION_ESTABLISHED,
            Some(serde_json::json!({
                "connectionId": conn_id.as_str(),
                "authenticated": authenticated,
            })),
        )
    }

    /// Acknowledgement of a successful `authenticate`.
    pub fn authenticated(user_id: &UserId) -> Self {
        Self::new(
            AUTHENTICATED,
            Some(serde_json::json!({ "userId": user_id.as_str() })),
        )
    }

    /// Failure notice for a rejected `authenticate`.
    pub fn authentication_error(message: impl Into<String>) -> Self {
        Self::new(
            AUTHENTICATION_ERROR,
            Some(serde_json::json!({ "message": message.into() })),
        )
    }

    /// A pushed domain event. The frame type is the event kind; the payload
    /// is the event schema minus the redundant tag.
    pub fn event(event: &TaskEvent) -> Self {
        let mut data = serde_json::to_value(event).unwrap_or(Value::Null);
        if let Some(map) = data.as_object_mut() {
            let _ = map.remove("kind");
        }
        Self::new(event.kind(), Some(data))
    }
}

/// Why a connection ended, as seen by the client controller.
///
/// Deliberate local teardown must not trigger automatic reconnection;
/// everything else may.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The local side closed on purpose (sign-out or explicit disconnect).
    LocalDisconnect,
    /// The remote side closed the connection.
    RemoteClose,
    /// The transport failed (network error, handshake failure, timeout).
    TransportError,
}

impl DisconnectReason {
    /// Whether this disconnect was chosen by the local side.
    pub fn is_deliberate(self) -> bool {
        matches!(self, Self::LocalDisconnect)
    }

    /// Stable reason string for logs and status surfaces.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LocalDisconnect => "client disconnect",
            Self::RemoteClose => "server close",
            Self::TransportError => "transport error",
        }
    }
}
