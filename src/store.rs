//! Byte-blob key-value backends used for snapshot persistence.

use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// One file per key under `root`, with a total byte capacity.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
    capacity: u64,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>, capacity: u64) -> Self {
        Self {
            root: root.into(),
            capacity,
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(name)
    }

    async fn used_bytes_excluding(&self, skip: &Path) -> Result<u64, StoreError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };
        let mut total = 0u64;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path() == skip {
                continue;
            }
            let meta = entry.metadata().await?;
            if meta.is_file() {
                total += meta.len();
            }
        }
        Ok(total)
    }
}

#[async_trait]
impl BlobStore for DirStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Replace the value for `key` atomically via a temp file and rename.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let needed = self.used_bytes_excluding(&path).await? + value.len() as u64;
        if needed > self.capacity {
            return Err(StoreError::QuotaExceeded {
                needed,
                capacity: self.capacity,
            });
        }

        fs::create_dir_all(&self.root).await?;
        let temp_path = self.root.join(format!(".{}.tmp", path_file_name(&path)));
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(value).await?;
        file.flush().await?;
        drop(file);

        if let Err(err) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err.into());
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn path_file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// In-process store with the same quota rule as [`DirStore`].
#[derive(Debug)]
pub struct MemoryStore {
    capacity: u64,
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut entries = self.entries();
        let used: u64 = entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(_, v)| v.len() as u64)
            .sum();
        let needed = used + value.len() as u64;
        if needed > self.capacity {
            return Err(StoreError::QuotaExceeded {
                needed,
                capacity: self.capacity,
            });
        }
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn dir_store_round_trips_and_removes() {
        let dir = tempdir().expect("tempdir");
        let store = DirStore::new(dir.path().join("cache"), 1024);
        assert!(store.get("k").await.expect("get").is_none());

        store.put("k", b"hello").await.expect("put");
        assert_eq!(store.get("k").await.expect("get").as_deref(), Some(&b"hello"[..]));

        store.put("k", b"bye").await.expect("overwrite");
        assert_eq!(store.get("k").await.expect("get").as_deref(), Some(&b"bye"[..]));

        store.remove("k").await.expect("remove");
        store.remove("k").await.expect("remove twice");
        assert!(store.get("k").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn dir_store_enforces_capacity() {
        let dir = tempdir().expect("tempdir");
        let store = DirStore::new(dir.path(), 8);
        store.put("a", b"12345").await.expect("fits");
        let err = store.put("b", b"12345").await.expect_err("over quota");
        assert!(matches!(err, StoreError::QuotaExceeded { needed: 10, capacity: 8 }));
        // replacing an existing key only counts the new value
        store.put("a", b"12345678").await.expect("replace fits");
    }

    #[tokio::test]
    async fn memory_store_enforces_capacity() {
        let store = MemoryStore::new(4);
        store.put("a", b"1234").await.expect("fits");
        assert!(matches!(
            store.put("b", b"1").await,
            Err(StoreError::QuotaExceeded { .. })
        ));
        store.remove("a").await.expect("remove");
        store.put("b", b"1").await.expect("fits after remove");
    }
}
