//! Persisted credential storage.
//!
//! Exactly one credential is stored at a time. The file-backed store keeps it
//! in `~/.bakeassist/credential` with owner-only permissions so it survives
//! process restarts.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Error, Result};

/// Default credential file, relative to the home directory
const DEFAULT_CREDENTIAL_PATH: &str = ".bakeassist/credential";

/// Durable slot for the bearer credential
pub trait CredentialStore: Send + Sync {
    /// Read the stored credential, if any
    fn get(&self) -> Result<Option<String>>;

    /// Replace the stored credential
    fn set(&self, credential: &str) -> Result<()>;

    /// Remove the stored credential. Removing an absent credential is not an error.
    fn remove(&self) -> Result<()>;
}

/// Credential store backed by a single file
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Store at the default location under the home directory
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| Error::Other("No home directory".into()))?;
        Ok(Self::with_path(home.join(DEFAULT_CREDENTIAL_PATH)))
    }

    /// Store at a custom path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let credential = content.trim();
                if credential.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(credential.to_string()))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, credential: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, credential)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process credential store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a credential
    pub fn with_credential(credential: impl Into<String>) -> Self {
        Self {
            credential: Mutex::new(Some(credential.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Result<Option<String>> {
        let slot = self.credential.lock().map_err(|_| Error::Other("Credential lock poisoned".into()))?;
        Ok(slot.clone())
    }

    fn set(&self, credential: &str) -> Result<()> {
        let mut slot = self.credential.lock().map_err(|_| Error::Other("Credential lock poisoned".into()))?;
        *slot = Some(credential.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        let mut slot = self.credential.lock().map_err(|_| Error::Other("Credential lock poisoned".into()))?;
        *slot = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_roundtrip() {
        let temp = tempdir().expect("Failed to create temp dir");
        let store = FileCredentialStore::with_path(temp.path().join("nested").join("credential"));

        assert_eq!(store.get().unwrap(), None);

        store.set("header.payload.sig").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("header.payload.sig"));

        store.set("second.token.sig").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("second.token.sig"));

        store.remove().unwrap();
        assert_eq!(store.get().unwrap(), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_file_store_remove_is_idempotent() {
        let temp = tempdir().expect("Failed to create temp dir");
        let store = FileCredentialStore::with_path(temp.path().join("credential"));

        store.remove().unwrap();
        store.remove().unwrap();
    }

    #[test]
    fn test_file_store_ignores_blank_file() {
        let temp = tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("credential");
        fs::write(&path, "  \n").unwrap();

        let store = FileCredentialStore::with_path(&path);
        assert_eq!(store.get().unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().expect("Failed to create temp dir");
        let store = FileCredentialStore::with_path(temp.path().join("credential"));
        store.set("a.b.c").unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryCredentialStore::with_credential("a.b.c");
        assert_eq!(store.get().unwrap().as_deref(), Some("a.b.c"));

        store.remove().unwrap();
        assert_eq!(store.get().unwrap(), None);

        store.set("d.e.f").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("d.e.f"));
    }
}
