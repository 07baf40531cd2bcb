//! Durable client-side session storage.
//!
//! # Design
//! Two layers:
//! - `StorageBackend` is a dumb string key/value store. `MemoryBackend`
//!   lives for the process; `FileBackend` persists a JSON object to disk.
//! - `PrefixedStorage` namespaces keys under an application prefix
//!   (`accessToken` is stored as `vanomaAccessToken`) and migrates values
//!   written by older releases under the bare key on first read.
//!
//! The pipeline only sees the `CredentialProvider` trait, so callers can
//! plug in any store (an OS keychain, a test double) without touching it.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}

/// Raw string key/value store.
pub trait StorageBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    items: Mutex<BTreeMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>, StorageError> {
        self.items.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}

/// Key/value store persisted as a single JSON object.
///
/// Every operation reads the file, so values written by another process
/// are picked up. A missing file is an empty store.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string_pretty(items)?;
        // Write-then-rename keeps the file whole.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update<F>(&self, f: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.guard.lock().map_err(|_| StorageError::Poisoned)?;
        let mut items = self.load()?;
        f(&mut items);
        self.save(&items)
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.guard.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update(|items| {
            items.remove(key);
        })
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let _guard = self.guard.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(self.load()?.into_keys().collect())
    }
}

/// Well-known session keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKey {
    AccessToken,
    UserId,
    CustomerId,
    AgentId,
}

impl SessionKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionKey::AccessToken => "accessToken",
            SessionKey::UserId => "userId",
            SessionKey::CustomerId => "customerId",
            SessionKey::AgentId => "agentId",
        }
    }
}

/// Source of truth for the current credential.
pub trait CredentialProvider: Send + Sync {
    fn get(&self, key: SessionKey) -> Result<Option<String>, StorageError>;
    fn set(&self, key: SessionKey, value: &str) -> Result<(), StorageError>;
    /// Drop every session value.
    fn clear(&self) -> Result<(), StorageError>;

    fn access_token(&self) -> Result<Option<String>, StorageError> {
        self.get(SessionKey::AccessToken)
    }

    fn user_id(&self) -> Result<Option<String>, StorageError> {
        self.get(SessionKey::UserId)
    }

    fn set_access_token(&self, token: &str) -> Result<(), StorageError> {
        self.set(SessionKey::AccessToken, token)
    }

    /// Record a fresh sign-in.
    fn store_session(&self, access_token: &str, user_id: &str) -> Result<(), StorageError> {
        self.set(SessionKey::AccessToken, access_token)?;
        self.set(SessionKey::UserId, user_id)
    }
}

impl<C: CredentialProvider + ?Sized> CredentialProvider for Arc<C> {
    fn get(&self, key: SessionKey) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: SessionKey, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn clear(&self) -> Result<(), StorageError> {
        (**self).clear()
    }
}

impl<C: CredentialProvider + ?Sized> CredentialProvider for &C {
    fn get(&self, key: SessionKey) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: SessionKey, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn clear(&self) -> Result<(), StorageError> {
        (**self).clear()
    }
}

pub const DEFAULT_PREFIX: &str = "vanoma";

/// Namespaced view over a `StorageBackend`.
#[derive(Debug)]
pub struct PrefixedStorage<B> {
    prefix: String,
    backend: B,
}

impl PrefixedStorage<MemoryBackend> {
    pub fn in_memory(prefix: impl Into<String>) -> Self {
        Self::new(prefix, MemoryBackend::new())
    }
}

impl PrefixedStorage<FileBackend> {
    pub fn at_path(prefix: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(prefix, FileBackend::new(path))
    }
}

impl<B: StorageBackend> PrefixedStorage<B> {
    pub fn new(prefix: impl Into<String>, backend: B) -> Self {
        Self {
            prefix: prefix.into(),
            backend,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// `accessToken` becomes `<prefix>AccessToken`.
    fn prefixed(&self, key: &str) -> String {
        let mut chars = key.chars();
        match chars.next() {
            Some(first) => format!("{}{}{}", self.prefix, first.to_uppercase(), chars.as_str()),
            None => self.prefix.clone(),
        }
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        if let Some(value) = self.backend.get(&self.prefixed(key))? {
            return Ok(Some(value));
        }

        // Older releases stored keys without a prefix; move them over.
        match self.backend.get(key)? {
            Some(value) => {
                self.set_item(key, &value)?;
                self.backend.remove(key)?;
                tracing::debug!(key, "migrated legacy storage key");
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.backend.set(&self.prefixed(key), value)
    }

    pub fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.backend.remove(&self.prefixed(key))
    }

    /// Remove every key under this prefix, leaving foreign keys alone.
    pub fn clear_all(&self) -> Result<(), StorageError> {
        for key in self.backend.keys()? {
            if key.starts_with(&self.prefix) {
                self.backend.remove(&key)?;
            }
        }
        Ok(())
    }
}

impl<B: StorageBackend> CredentialProvider for PrefixedStorage<B> {
    fn get(&self, key: SessionKey) -> Result<Option<String>, StorageError> {
        self.get_item(key.as_str())
    }

    fn set(&self, key: SessionKey, value: &str) -> Result<(), StorageError> {
        self.set_item(key.as_str(), value)
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.clear_all()
    }
}
