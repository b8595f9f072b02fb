//! Settings loading with deep merge and environment variable overrides.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)
//!
//! Env overrides have strict parsing rules; invalid values are silently
//! ignored, falling back to the file value or default.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::TaskwireSettings;

/// Resolve the path to the settings file (`~/.taskwire/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".taskwire").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<TaskwireSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<TaskwireSettings> {
    let defaults = serde_json::to_value(TaskwireSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: TaskwireSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `TASKWIRE_*` environment variable overrides.
pub fn apply_env_overrides(settings: &mut TaskwireSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary lookup (tests pass a map).
pub fn apply_overrides_from(
    settings: &mut TaskwireSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read_string(&lookup, "TASKWIRE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_u16(&lookup, "TASKWIRE_PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = read_string(&lookup, "TASKWIRE_JWT_SECRET") {
        settings.server.jwt_secret = v;
    }
    if let Some(v) = read_u64(&lookup, "TASKWIRE_HEARTBEAT_INTERVAL_SECS", 1, 600) {
        settings.server.heartbeat_interval_secs = v;
    }
    if let Some(v) = read_u64(&lookup, "TASKWIRE_HEARTBEAT_TIMEOUT_SECS", 1, 3600) {
        settings.server.heartbeat_timeout_secs = v;
    }
    if let Some(v) = read_string(&lookup, "TASKWIRE_ROOM_PREFIX") {
        settings.server.room_prefix = v;
    }

    // ── Client ──────────────────────────────────────────────────────
    if let Some(v) = read_string(&lookup, "TASKWIRE_WS_URL") {
        settings.client.ws_url = Some(v);
    }
    if let Some(v) = read_string(&lookup, "TASKWIRE_API_URL") {
        settings.client.api_url = Some(v);
    }
    if let Some(v) = read_string(&lookup, "TASKWIRE_TOKEN_KEY") {
        settings.client.token_key = v;
    }
    if let Some(v) = read_u32(&lookup, "TASKWIRE_RECONNECT_ATTEMPTS", 0, 1000) {
        settings.client.reconnect.max_attempts = v;
    }
    if let Some(v) = read_u64(&lookup, "TASKWIRE_RECONNECT_BASE_DELAY_MS", 1, 600_000) {
        settings.client.reconnect.base_delay_ms = v;
    }
    if let Some(v) = read_u64(&lookup, "TASKWIRE_RECONNECT_MAX_DELAY_MS", 1, 600_000) {
        settings.client.reconnect.max_delay_ms = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_string(&lookup, "TASKWIRE_LOG") {
        settings.logging.level = v;
    }
}

fn read_string(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).filter(|v| !v.is_empty())
}

fn read_u16(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    min: u16,
    max: u16,
) -> Option<u16> {
    lookup(name)?
        .parse::<u16>()
        .ok()
        .filter(|v| (min..=max).contains(v))
}

fn read_u32(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    min: u32,
    max: u32,
) -> Option<u32> {
    lookup(name)?
        .parse::<u32>()
        .ok()
        .filter(|v| (min..=max).contains(v))
}

fn read_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    min: u64,
    max: u64,
) -> Option<u64> {
    lookup(name)?
        .parse::<u64>()
        .ok()
        .filter(|v| (min..=max).contains(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_map<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn missing_file_yields_defaults() {
        let settings =
            load_settings_from_path(Path::new("/no/such/settings.json")).unwrap();
        assert_eq!(settings.server.port, 5000);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(load_settings_from_path(file.path()).is_err());
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"server":{{"port":9000}},"client":{{"tokenKey":"jwt"}}}}"#
        )
        .unwrap();
        let settings = load_settings_from_path(file.path()).unwrap();
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.client.token_key, "jwt");
    }

    #[test]
    fn deep_merge_skips_nulls() {
        let target = serde_json::json!({"a": 1, "b": {"c": 2}});
        let source = serde_json::json!({"a": null, "b": {"c": 3}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"]["c"], 3);
    }

    #[test]
    fn deep_merge_replaces_arrays() {
        let target = serde_json::json!({"a": [1, 2, 3]});
        let source = serde_json::json!({"a": [9]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], serde_json::json!([9]));
    }

    #[test]
    fn env_overrides_take_priority() {
        let mut settings = TaskwireSettings::default();
        apply_overrides_from(
            &mut settings,
            lookup_map(&[
                ("TASKWIRE_PORT", "8081"),
                ("TASKWIRE_JWT_SECRET", "prod-secret"),
                ("TASKWIRE_WS_URL", "ws://gateway.internal/ws"),
                ("TASKWIRE_RECONNECT_ATTEMPTS", "3"),
            ]),
        );
        assert_eq!(settings.server.port, 8081);
        assert_eq!(settings.server.jwt_secret, "prod-secret");
        assert_eq!(
            settings.client.ws_url.as_deref(),
            Some("ws://gateway.internal/ws")
        );
        assert_eq!(settings.client.reconnect.max_attempts, 3);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut settings = TaskwireSettings::default();
        apply_overrides_from(
            &mut settings,
            lookup_map(&[
                ("TASKWIRE_PORT", "not-a-port"),
                ("TASKWIRE_HEARTBEAT_INTERVAL_SECS", "0"),
                ("TASKWIRE_HOST", ""),
            ]),
        );
        assert_eq!(settings.server.port, 5000);
        assert_eq!(settings.server.heartbeat_interval_secs, 25);
        assert_eq!(settings.server.host, "127.0.0.1");
    }

    #[test]
    fn settings_path_is_under_home() {
        let path = settings_path();
        assert!(path.ends_with(".taskwire/settings.json"));
    }
}
