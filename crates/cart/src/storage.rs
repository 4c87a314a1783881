//! Durable local key-value slots.
//!
//! Plays the role browser local storage plays for the storefront: small
//! string slots under well-known keys. Reads treat every failure (missing,
//! unreadable, corrupt) as absence; slot removal tolerates absence.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::warn;

/// Slot holding the serialized anonymous cart.
pub const CART_KEY: &str = "kuppam_cart";

/// Slot holding the bearer credential between sessions.
pub const TOKEN_KEY: &str = "token";

/// Errors raised by slot writes.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be serialized.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A durable string slot store.
///
/// The slot is process-wide and unsynchronized across processes: concurrent
/// writers get last-write-wins with no merge.
pub trait KeyValueStore: Send + Sync {
    /// Read a slot. Absence and unreadable content both yield `None`.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a slot, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the value could not be durably written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a slot. Removing an absent slot is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing slot could not be removed.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// =============================================================================
// FileStore
// =============================================================================

/// File-backed store: one file per key under a base directory.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created lazily on
    /// first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        match fs::read_to_string(self.path(key)) {
            Ok(value) => Some(value),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(key, error = %e, "unreadable storage slot, treating as absent");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_store() -> FileStore {
        let dir = std::env::temp_dir().join(format!("kuppam-test-{}", uuid::Uuid::new_v4()));
        FileStore::new(dir)
    }

    #[test]
    fn test_file_store_round_trip() {
        let store = temp_store();
        assert_eq!(store.get("slot"), None);

        store.set("slot", "value").unwrap();
        assert_eq!(store.get("slot").as_deref(), Some("value"));

        store.remove("slot").unwrap();
        assert_eq!(store.get("slot"), None);
    }

    #[test]
    fn test_file_store_remove_absent_slot_is_ok() {
        let store = temp_store();
        assert!(store.remove("never-written").is_ok());
    }

    #[test]
    fn test_file_store_overwrites() {
        let store = temp_store();
        store.set("slot", "first").unwrap();
        store.set("slot", "second").unwrap();
        assert_eq!(store.get("slot").as_deref(), Some("second"));
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        store.set(CART_KEY, "[]").unwrap();
        assert_eq!(store.get(CART_KEY).as_deref(), Some("[]"));

        store.remove(CART_KEY).unwrap();
        assert_eq!(store.get(CART_KEY), None);
    }
}
