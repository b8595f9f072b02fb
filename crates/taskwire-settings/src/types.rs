//! Settings structures with compiled defaults.

use serde::{Deserialize, Serialize};
use taskwire_core::backoff::ReconnectPolicy;
use taskwire_core::rooms::DEFAULT_ROOM_PREFIX;

/// Top-level settings document (`~/.taskwire/settings.json`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskwireSettings {
    /// Gateway server settings.
    pub server: ServerSettings,
    /// Client controller settings.
    pub client: ClientSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Gateway server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Host to bind.
    pub host: String,
    /// Port to bind (0 for auto-assign).
    pub port: u16,
    /// Shared secret for bearer-token verification.
    pub jwt_secret: String,
    /// Interval between server Ping frames in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close a connection after this many seconds without a Pong.
    pub heartbeat_timeout_secs: u64,
    /// Maximum inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Prefix for per-user room names.
    pub room_prefix: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            // matches the account layer's fallback; override in deployment
            jwt_secret: "fallback-secret-key".into(),
            heartbeat_interval_secs: 25,
            heartbeat_timeout_secs: 60,
            max_message_size: 1_000_000,
            room_prefix: DEFAULT_ROOM_PREFIX.into(),
        }
    }
}

/// Client controller settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Explicit WebSocket URL. Takes precedence over `api_url`.
    pub ws_url: Option<String>,
    /// Base API URL; the WebSocket URL is derived by stripping a trailing
    /// `/api` when `ws_url` is unset.
    pub api_url: Option<String>,
    /// Key under which the bearer token is stored.
    pub token_key: String,
    /// Reconnection policy after unexpected loss.
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            ws_url: None,
            api_url: None,
            token_key: "token".into(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Log filter directive (e.g. `info`, `taskwire_server=debug`).
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}
