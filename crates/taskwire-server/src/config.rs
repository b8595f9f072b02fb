//! Gateway server configuration.

use serde::{Deserialize, Serialize};
use taskwire_core::rooms::DEFAULT_ROOM_PREFIX;
use taskwire_settings::types::ServerSettings;

/// Configuration for the taskwire gateway.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Shared secret for bearer-token verification.
    pub jwt_secret: String,
    /// Interval between server-initiated Ping frames in seconds.
    pub heartbeat_interval_secs: u64,
    /// Disconnect after this many seconds without a Pong.
    pub heartbeat_timeout_secs: u64,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Capacity of each connection's outbound buffer (messages).
    pub send_buffer: usize,
    /// Prefix for per-user room names (logs and diagnostics).
    pub room_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            jwt_secret: "fallback-secret-key".into(),
            heartbeat_interval_secs: 25,
            heartbeat_timeout_secs: 60,
            max_message_size: 1_000_000,
            send_buffer: 1024,
            room_prefix: DEFAULT_ROOM_PREFIX.into(),
        }
    }
}

impl ServerConfig {
    /// Build a config from loaded settings.
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            jwt_secret: settings.jwt_secret.clone(),
            heartbeat_interval_secs: settings.heartbeat_interval_secs,
            heartbeat_timeout_secs: settings.heartbeat_timeout_secs,
            max_message_size: settings.max_message_size,
            send_buffer: 1024,
            room_prefix: settings.room_prefix.clone(),
        }
    }
}
