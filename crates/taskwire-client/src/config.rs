//! Client configuration and gateway URL derivation.

use taskwire_core::backoff::ReconnectPolicy;
use taskwire_settings::types::ClientSettings;

/// Fallback gateway URL when nothing is configured.
pub const DEFAULT_GATEWAY_URL: &str = "ws://localhost:5000/ws";

/// Configuration for the gateway client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// `WebSocket` URL of the gateway.
    pub url: String,
    /// Key under which the credential is stored.
    pub token_key: String,
    /// Reconnection policy.
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_GATEWAY_URL.into(),
            token_key: "token".into(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Build a config from loaded settings.
    ///
    /// An explicit `wsUrl` wins; otherwise the gateway URL is derived from
    /// the REST `apiUrl` by stripping its trailing `/api` segment and
    /// switching to the matching `WebSocket` scheme.
    pub fn from_settings(settings: &ClientSettings) -> Self {
        let url = settings
            .ws_url
            .clone()
            .or_else(|| settings.api_url.as_deref().map(derive_ws_url))
            .unwrap_or_else(|| DEFAULT_GATEWAY_URL.into());
        Self {
            url,
            token_key: settings.token_key.clone(),
            reconnect: settings.reconnect.clone(),
        }
    }
}

/// Derive a gateway `WebSocket` URL from a REST API base URL.
pub fn derive_ws_url(api_url: &str) -> String {
    let base = api_url
        .trim_end_matches('/')
        .trim_end_matches("/api")
        .trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{base}/ws")
}
