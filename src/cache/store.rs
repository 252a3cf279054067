//! Key/value storage behind the session cache.
//!
//! Durable storage is injected so the cache can run against an in-memory
//! fake in tests and a file-backed store in the CLI. Keys map to whole
//! serialized documents; each write is a single atomic value replacement.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

/// Errors that can occur writing to a session store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error reading or writing the backing file.
    #[error("storage I/O error at {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Durable key/value storage for serialized session state.
pub trait SessionStore: Send + Sync {
    /// Reads the value stored under `key`, if any.
    fn read(&self, key: &str) -> Option<String>;

    /// Writes `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing storage rejects the write.
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removes `key` unconditionally. Removing an absent key is a no-op.
    fn remove(&self, key: &str);
}

/// In-memory store for tests and ephemeral embedding.
///
/// Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn read(&self, key: &str) -> Option<String> {
        self.inner.lock().ok()?.get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Ok(mut map) = self.inner.lock() {
            map.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn remove(&self, key: &str) {
        if let Ok(mut map) = self.inner.lock() {
            map.remove(key);
        }
    }
}

/// File-backed store: one `<key>.json` file per key under a state directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SessionStore for FileStore {
    fn read(&self, key: &str) -> Option<String> {
        let path = self.key_path(key);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Some(contents),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => None,
            Err(error) => {
                warn!(path = %path.display(), error = %error, "failed to read session state file");
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.key_path(key);
        std::fs::write(&path, value).map_err(|source| StoreError::Io { path, source })
    }

    fn remove(&self, key: &str) {
        let path = self.key_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed session state file"),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => {
                warn!(path = %path.display(), error = %error, "failed to remove session state file");
            }
        }
    }
}
