//! Persistent key/value storage for the cache mirror.
//!
//! Each key holds one serialized array and is replaced wholesale on every
//! write.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use servetrack_core::{Error, Result};

/// Local persistent storage keyed by name.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Stored value, or `None` if the key was never written.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value under `key`.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}

fn check_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("Invalid cache key: {:?}", key)))
    }
}

/// One JSON file per key under a base directory.
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        check_key(key)?;
        Ok(self.base_path.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl LocalStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        debug!(key, path = %path.display(), size = value.len(), "cache_store: write");

        fs::create_dir_all(&self.base_path).await.map_err(|e| {
            warn!(dir = %self.base_path.display(), error = %e, "cache_store: create_dir_all failed");
            e
        })?;

        // Atomic write: temp file + rename
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            warn!(temp_path = %temp_path.display(), error = %e, "cache_store: File::create failed");
            e
        })?;
        file.write_all(value.as_bytes()).await.map_err(|e| {
            warn!(error = %e, "cache_store: write_all failed");
            e
        })?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &path).await.map_err(|e| {
            warn!(from = %temp_path.display(), to = %path.display(), error = %e, "cache_store: rename failed");
            e
        })?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if fs::try_exists(&path).await? {
            fs::remove_file(path).await?;
        }
        Ok(())
    }
}

/// In-process store for tests and ephemeral sessions.
#[derive(Clone, Default)]
pub struct MemoryLocalStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Internal("cache store lock poisoned".to_string()))
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        check_key(key)?;
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_replace_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("cache"));

        assert_eq!(store.get("clients").await.unwrap(), None);

        store.set("clients", "[1]").await.unwrap();
        store.set("clients", "[2]").await.unwrap();
        assert_eq!(store.get("clients").await.unwrap().as_deref(), Some("[2]"));
        assert!(!dir.path().join("cache/clients.tmp").exists());

        store.remove("clients").await.unwrap();
        store.remove("clients").await.unwrap();
        assert_eq!(store.get("clients").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(matches!(
            store.set("../escape", "x").await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryLocalStore::new();
        store.set("serveAttempts", "[]").await.unwrap();
        assert_eq!(store.get("serveAttempts").await.unwrap().as_deref(), Some("[]"));
    }
}
