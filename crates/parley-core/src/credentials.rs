//! Session credential storage.
//!
//! The client persists only the authentication token and the user id. There
//! is no expiry or refresh policy: credentials live until the server rejects
//! them, at which point [`crate::auth::AuthExpiry`] clears them.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::errors::CredentialError;

/// Stored session credentials.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// Authentication token, attached out-of-band to the channel.
    pub token: Option<String>,
    /// Signed-in user.
    pub user_id: Option<String>,
    /// RFC 3339 timestamp of the last write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl Credentials {
    /// Credentials for a signed-in user.
    pub fn new(token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            user_id: Some(user_id.into()),
            last_updated: None,
        }
    }

    /// Both a token and a user id are present.
    pub fn is_logged_in(&self) -> bool {
        self.token.is_some() && self.user_id.is_some()
    }
}

/// Storage for the session credentials.
pub trait CredentialStore: Send + Sync {
    /// Current credentials (empty when signed out).
    fn credentials(&self) -> Credentials;
    /// Replace the stored credentials.
    fn set(&self, credentials: Credentials) -> Result<(), CredentialError>;
    /// Remove token and user id.
    fn clear(&self) -> Result<(), CredentialError>;

    /// Stored token, if any.
    fn token(&self) -> Option<String> {
        self.credentials().token
    }

    /// Whether the user is signed in.
    fn is_logged_in(&self) -> bool {
        self.credentials().is_logged_in()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory store
// ─────────────────────────────────────────────────────────────────────────────

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<Credentials>,
}

impl MemoryCredentialStore {
    /// Store seeded with `credentials`.
    pub fn with(credentials: Credentials) -> Self {
        Self {
            inner: RwLock::new(credentials),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn credentials(&self) -> Credentials {
        self.inner.read().clone()
    }

    fn set(&self, credentials: Credentials) -> Result<(), CredentialError> {
        *self.inner.write() = credentials;
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        *self.inner.write() = Credentials::default();
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File store
// ─────────────────────────────────────────────────────────────────────────────

/// Default credentials file name.
const CREDENTIALS_FILE_NAME: &str = "credentials.json";

/// Credentials file path under the given data directory.
pub fn credentials_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CREDENTIALS_FILE_NAME)
}

/// JSON file store written with owner-only permissions.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Store at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Option<Credentials> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("failed to read credentials file: {e}");
                return None;
            }
        };
        match serde_json::from_str(&data) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                tracing::warn!("failed to parse credentials file: {e}");
                None
            }
        }
    }

    fn save(&self, credentials: &mut Credentials) -> Result<(), CredentialError> {
        credentials.last_updated = Some(chrono::Utc::now().to_rfc3339());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(credentials)?;
        std::fs::write(&self.path, &json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&self.path, perms);
        }

        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn credentials(&self) -> Credentials {
        self.load().unwrap_or_default()
    }

    fn set(&self, mut credentials: Credentials) -> Result<(), CredentialError> {
        self.save(&mut credentials)
    }

    fn clear(&self) -> Result<(), CredentialError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_set_and_clear() {
        let store = MemoryCredentialStore::default();
        assert!(!store.is_logged_in());

        store.set(Credentials::new("tok", "u1")).unwrap();
        assert!(store.is_logged_in());
        assert_eq!(store.token().as_deref(), Some("tok"));

        store.clear().unwrap();
        assert_eq!(store.credentials(), Credentials::default());
    }

    #[test]
    fn token_without_user_is_not_logged_in() {
        let creds = Credentials {
            token: Some("tok".into()),
            ..Credentials::default()
        };
        assert!(!creds.is_logged_in());
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(credentials_file_path(dir.path()));
        assert!(!store.is_logged_in());

        store.set(Credentials::new("tok", "u1")).unwrap();
        let loaded = store.credentials();
        assert_eq!(loaded.token.as_deref(), Some("tok"));
        assert_eq!(loaded.user_id.as_deref(), Some("u1"));
        assert!(loaded.last_updated.is_some());
    }

    #[test]
    fn file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("credentials.json");
        let store = FileCredentialStore::new(&path);
        store.set(Credentials::new("tok", "u1")).unwrap();
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("credentials.json"));
        store.set(Credentials::new("tok", "u1")).unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn file_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("credentials.json"));
        store.clear().unwrap();
        store.set(Credentials::new("tok", "u1")).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(!store.is_logged_in());
    }

    #[test]
    fn invalid_file_reads_as_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = FileCredentialStore::new(&path);
        assert_eq!(store.credentials(), Credentials::default());
    }
}
