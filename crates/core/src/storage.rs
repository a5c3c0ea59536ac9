//! Credential storage
//!
//! A small synchronous key/value store holding the credential pair. It plays
//! the part browser local storage plays for a web client: every outbound
//! request reads from it, and login, refresh and logout write to it.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Storage key of the access credential
pub const ACCESS_KEY: &str = "access";

/// Storage key of the refresh credential
pub const REFRESH_KEY: &str = "refresh";

/// Access and refresh credentials issued by the login endpoint
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access: String,
    pub refresh: String,
}

impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

/// Synchronous string key/value store for credentials
///
/// Implementations must make each operation atomic with respect to readers so
/// that a `get` never observes a half-written value.
pub trait CredentialStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> CoreResult<()>;

    /// Remove a value; removing a missing key is not an error
    fn remove(&self, key: &str) -> CoreResult<()>;

    /// The stored access credential, if present and non-empty
    fn access_token(&self) -> Option<String> {
        self.get(ACCESS_KEY).filter(|value| !value.is_empty())
    }

    /// The stored refresh credential, if present and non-empty
    fn refresh_token(&self) -> Option<String> {
        self.get(REFRESH_KEY).filter(|value| !value.is_empty())
    }

    /// Both credentials, when both are stored
    fn credentials(&self) -> Option<CredentialPair> {
        Some(CredentialPair {
            access: self.access_token()?,
            refresh: self.refresh_token()?,
        })
    }

    /// Persist both credentials
    fn store_credentials(&self, pair: &CredentialPair) -> CoreResult<()> {
        self.set(ACCESS_KEY, &pair.access)?;
        self.set(REFRESH_KEY, &pair.refresh)
    }

    /// Remove both credentials
    ///
    /// Both removals are attempted; the first failure is returned.
    fn clear_credentials(&self) -> CoreResult<()> {
        let access = self.remove(ACCESS_KEY);
        let refresh = self.remove(REFRESH_KEY);
        access.and(refresh)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> CoreResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| CoreError::internal_error("credential store lock poisoned"))
}

/// In-process credential store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding a credential pair
    pub fn with_credentials(pair: &CredentialPair) -> Self {
        let entries = BTreeMap::from([
            (ACCESS_KEY.to_string(), pair.access.clone()),
            (REFRESH_KEY.to_string(), pair.refresh.clone()),
        ]);
        Self {
            entries: Mutex::new(entries),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> CoreResult<()> {
        lock(&self.entries)?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> CoreResult<()> {
        lock(&self.entries)?.remove(key);
        Ok(())
    }
}

/// Credential store persisted as a JSON object on disk
///
/// The file is read on every access so that several processes sharing a state
/// directory observe each other's logins and refreshes. Writes go through a
/// temporary file and a rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> CoreResult<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(CoreError::io_at(&self.path, &err)),
        }
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| CoreError::io_at(parent, &err))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(entries)?;
        // A stale temporary file would keep its old permissions
        match fs::remove_file(&tmp) {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
                return Err(CoreError::io_at(&tmp, &err));
            }
            _ => {}
        }
        write_private(&tmp, content.as_bytes()).map_err(|err| CoreError::io_at(&tmp, &err))?;
        fs::rename(&tmp, &self.path).map_err(|err| CoreError::io_at(&self.path, &err))
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> CoreResult<()> {
        let _guard = lock(&self.write_lock)?;
        let mut entries = match self.load() {
            Ok(entries) => entries,
            // Unparseable content is overwritten by the next write
            Err(err @ CoreError::Serialization { .. }) => {
                tracing::warn!(path = %self.path.display(), "Discarding unreadable credential store: {err}");
                BTreeMap::new()
            }
            Err(err) => return Err(err),
        };
        f(&mut entries);
        self.save(&entries)
    }
}

/// Write `contents` to `path`, readable by the owner only
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.load() {
            Ok(mut entries) => entries.remove(key),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), "Failed to read credential store: {err}");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> CoreResult<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> CoreResult<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(access: &str, refresh: &str) -> CredentialPair {
        CredentialPair {
            access: access.to_string(),
            refresh: refresh.to_string(),
        }
    }

    #[test]
    fn memory_store_round_trips_credentials() {
        let store = MemoryStore::new();
        assert!(store.credentials().is_none());

        store.store_credentials(&pair("a1", "r1")).unwrap();
        assert_eq!(store.get(ACCESS_KEY).as_deref(), Some("a1"));
        assert_eq!(store.credentials(), Some(pair("a1", "r1")));

        store.clear_credentials().unwrap();
        assert!(store.get(ACCESS_KEY).is_none());
        assert!(store.get(REFRESH_KEY).is_none());
    }

    #[test]
    fn empty_access_value_is_not_a_credential() {
        let store = MemoryStore::new();
        store.set(ACCESS_KEY, "").unwrap();
        assert!(store.access_token().is_none());
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("credentials.json");

        FileStore::new(&path)
            .store_credentials(&pair("a1", "r1"))
            .unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.credentials(), Some(pair("a1", "r1")));

        reopened.remove(REFRESH_KEY).unwrap();
        assert_eq!(FileStore::new(&path).access_token().as_deref(), Some("a1"));
        assert!(FileStore::new(&path).refresh_token().is_none());
    }

    #[test]
    fn file_store_missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("missing.json"));
        assert!(store.get(ACCESS_KEY).is_none());
        store.remove(ACCESS_KEY).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn file_store_is_readable_by_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        FileStore::new(&path)
            .store_credentials(&pair("a1", "r1"))
            .unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn file_store_tightens_existing_file_on_write() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, "{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        FileStore::new(&path).set(ACCESS_KEY, "a1").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn corrupt_file_is_overwritten_by_login_and_logout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, "{not json").unwrap();

        let store = FileStore::new(&path);
        assert!(store.access_token().is_none());

        store.clear_credentials().unwrap();
        assert!(store.get(ACCESS_KEY).is_none());
        assert!(store.get(REFRESH_KEY).is_none());

        fs::write(&path, "{\"access\": ").unwrap();
        store.store_credentials(&pair("a1", "r1")).unwrap();
        assert_eq!(FileStore::new(&path).credentials(), Some(pair("a1", "r1")));
    }

    #[test]
    fn credential_pair_debug_hides_tokens() {
        let rendered = format!("{:?}", pair("secret-access", "secret-refresh"));
        assert!(!rendered.contains("secret"));
    }
}
