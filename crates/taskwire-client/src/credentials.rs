//! Credential storage.
//!
//! The controller reads the bearer token from a [`CredentialStore`] each
//! time it (re)connects, so a token refreshed between attempts is picked up
//! without restarting the client. Sign-out clears the store before the
//! deliberate disconnect, which is what stops automatic reconnection from
//! re-authenticating.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Default credential file name under the data directory.
const CREDENTIALS_FILE_NAME: &str = "credentials.json";

/// Source of the bearer token used to authenticate gateway sessions.
pub trait CredentialStore: Send + Sync {
    /// Current token for the given key, if one is stored.
    fn get(&self, key: &str) -> Option<String>;

    /// Store a token under the given key.
    fn set(&self, key: &str, token: &str);

    /// Remove the token for the given key.
    fn clear(&self, key: &str);
}

/// In-memory store, used in tests and short-lived tools.
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<std::collections::HashMap<String, String>>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a token under the given key.
    pub fn with_token(key: &str, token: &str) -> Self {
        let store = Self::new();
        store.set(key, token);
        store
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, token: &str) {
        let _ = self.entries.lock().insert(key.to_string(), token.to_string());
    }

    fn clear(&self, key: &str) {
        let _ = self.entries.lock().remove(key);
    }
}

/// On-disk credential file contents.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    /// Schema version.
    version: u32,
    /// Stored tokens by key.
    #[serde(default)]
    tokens: std::collections::HashMap<String, String>,
    /// Last write time, RFC 3339.
    #[serde(default)]
    last_updated: String,
}

/// File-backed store at `<data_dir>/credentials.json`, written with 0o600.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Create a store over the credential file in the given data directory.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(CREDENTIALS_FILE_NAME),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> CredentialFile {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return CredentialFile::default();
            }
            Err(e) => {
                tracing::warn!("failed to read credential file: {e}");
                return CredentialFile::default();
            }
        };
        match serde_json::from_str::<CredentialFile>(&data) {
            Ok(file) if file.version <= 1 => file,
            Ok(file) => {
                tracing::warn!("unsupported credential file version: {}", file.version);
                CredentialFile::default()
            }
            Err(e) => {
                tracing::warn!("failed to parse credential file: {e}");
                CredentialFile::default()
            }
        }
    }

    fn save(&self, mut file: CredentialFile) {
        file.version = 1;
        file.last_updated = chrono::Utc::now().to_rfc3339();

        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("failed to create credential dir: {e}");
                return;
            }
        }
        let json = match serde_json::to_string_pretty(&file) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!("failed to serialize credentials: {e}");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, &json) {
            tracing::warn!("failed to write credential file: {e}");
            return;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&self.path, perms);
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> Option<String> {
        self.load().tokens.get(key).cloned()
    }

    fn set(&self, key: &str, token: &str) {
        let mut file = self.load();
        let _ = file.tokens.insert(key.to_string(), token.to_string());
        self.save(file);
    }

    fn clear(&self, key: &str) {
        let mut file = self.load();
        if file.tokens.remove(key).is_some() {
            self.save(file);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryCredentialStore::new();
        assert!(store.get("token").is_none());

        store.set("token", "abc");
        assert_eq!(store.get("token").unwrap(), "abc");

        store.clear("token");
        assert!(store.get("token").is_none());
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        assert!(store.get("token").is_none());

        store.set("token", "abc.def.ghi");
        assert_eq!(store.get("token").unwrap(), "abc.def.ghi");

        // a fresh store over the same dir sees the token
        let reopened = FileCredentialStore::new(dir.path());
        assert_eq!(reopened.get("token").unwrap(), "abc.def.ghi");

        reopened.clear("token");
        assert!(store.get("token").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn file_store_sets_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        store.set("token", "secret");

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn corrupt_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        std::fs::write(store.path(), "not json").unwrap();
        assert!(store.get("token").is_none());

        // writes recover the file
        store.set("token", "fresh");
        assert_eq!(store.get("token").unwrap(), "fresh");
    }
}
