//! # Document Store
//!
//! Key-value persistence for the two reconciler documents. The reconciler
//! only needs `load` and `save` of whole JSON documents; the host decides
//! where they live.
//!
//! - `JsonFileStore` writes `<dir>/<key>.json` through a temporary file and a
//!   rename, so a crash never leaves a half-written document.
//! - `MemoryStore` keeps documents in a map; used by tests and by hosts
//!   without a disk.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Result, TremError};

/// Whole-document persistence.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Stored document, `None` when the key was never saved.
    async fn load(&self, key: &str) -> Result<Option<Value>>;

    /// Replaces the document under `key`.
    async fn save(&self, key: &str, value: &Value) -> Result<()>;
}

/// One JSON file per key.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| TremError::Store { key: key.to_string(), reason: e.to_string() }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, key: &str, value: &Value) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let bytes = serde_json::to_vec_pretty(value)?;

        let path = self.path(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("Saved {}", path.display());
        Ok(())
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.docs.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &Value) -> Result<()> {
        self.docs.write().await.insert(key.to_string(), value.clone());
        Ok(())
    }
}

#[async_trait]
impl<S: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<S> {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        (**self).load(key).await
    }

    async fn save(&self, key: &str, value: &Value) -> Result<()> {
        (**self).save(key, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested"));

        assert!(store.load("report").await.unwrap().is_none());
        store.save("report", &json!({"cache": [], "fetch_time": 1.5})).await.unwrap();

        let loaded = store.load("report").await.unwrap().unwrap();
        assert_eq!(loaded["fetch_time"], 1.5);
        assert!(!dir.path().join("nested/report.json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("recent_data.json"), b"{not json").unwrap();

        let err = JsonFileStore::new(dir.path()).load("recent_data").await.unwrap_err();
        assert!(matches!(err, TremError::Store { .. }));
    }

    #[tokio::test]
    async fn memory_store_overwrites() {
        let store = MemoryStore::new();
        store.save("k", &json!(1)).await.unwrap();
        store.save("k", &json!(2)).await.unwrap();
        assert_eq!(store.load("k").await.unwrap(), Some(json!(2)));
    }
}
