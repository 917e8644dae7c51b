//! Data and object store seams.
//!
//! The harness seeds a key-value table before each scenario and keeps
//! campaign configs in an object store. Both are reached through the traits
//! here so a run can target an in-memory store, a local directory, or an
//! adapter for the real services.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::StoreError;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Destination for scenario seed records.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Write every item. Fails on the first write error.
    async fn insert_records(&self, items: &[Value]) -> StoreResult<()>;
}

/// Key/value blob store holding campaign configs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Keys starting with `prefix`, sorted.
    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Object body, or `None` when the key does not exist.
    async fn get_object(&self, key: &str) -> StoreResult<Option<Bytes>>;

    async fn put_object(&self, key: &str, body: Bytes) -> StoreResult<()>;

    /// Delete keys; missing keys are ignored.
    async fn delete_objects(&self, keys: &[String]) -> StoreResult<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Data stores
// ─────────────────────────────────────────────────────────────────────────────

/// Data store that keeps records in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataStore {
    records: Arc<Mutex<Vec<Value>>>,
}

impl InMemoryDataStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record written so far.
    #[must_use]
    pub fn records(&self) -> Vec<Value> {
        self.records.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

#[async_trait]
impl DataStore for InMemoryDataStore {
    async fn insert_records(&self, items: &[Value]) -> StoreResult<()> {
        self.records.lock().extend(items.iter().cloned());
        debug!(count = items.len(), "stored records in memory");
        Ok(())
    }
}

/// Data store that appends one JSON line per record to a file, for a
/// separate loader to replay into the real table.
#[derive(Debug, Clone)]
pub struct JsonlDataStore {
    path: PathBuf,
    table_name: String,
}

impl JsonlDataStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, table_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            table_name: table_name.into(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DataStore for JsonlDataStore {
    async fn insert_records(&self, items: &[Value]) -> StoreResult<()> {
        let mut buffer = Vec::new();
        for item in items {
            serde_json::to_writer(&mut buffer, item)?;
            buffer.push(b'\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|err| StoreError::io(&self.path, err))?;
        file.write_all(&buffer)
            .await
            .map_err(|err| StoreError::io(&self.path, err))?;
        file.flush()
            .await
            .map_err(|err| StoreError::io(&self.path, err))?;

        info!(
            table = %self.table_name,
            path = %self.path.display(),
            count = items.len(),
            "queued records for table"
        );
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Object stores
// ─────────────────────────────────────────────────────────────────────────────

/// Object store backed by a map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryObjectStore {
    objects: Arc<Mutex<BTreeMap<String, Bytes>>>,
}

impl InMemoryObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents, for assertions.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Bytes> {
        self.objects.lock().clone()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .objects
            .lock()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn get_object(&self, key: &str) -> StoreResult<Option<Bytes>> {
        Ok(self.objects.lock().get(key).cloned())
    }

    async fn put_object(&self, key: &str, body: Bytes) -> StoreResult<()> {
        self.objects.lock().insert(key.to_string(), body);
        Ok(())
    }

    async fn delete_objects(&self, keys: &[String]) -> StoreResult<()> {
        let mut objects = self.objects.lock();
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }
}

/// Object store mapping `a/b.json` keys to files below a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryObjectStore {
    root: PathBuf,
}

impl DirectoryObjectStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if valid {
            Ok(self.root.join(relative))
        } else {
            Err(StoreError::InvalidKey {
                key: key.to_string(),
            })
        }
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

#[async_trait]
impl ObjectStore for DirectoryObjectStore {
    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|err| StoreError::io(&dir, err))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|err| StoreError::io(&dir, err))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|err| StoreError::io(&path, err))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if let Some(key) = self.key_for(&path) {
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn get_object(&self, key: &str) -> StoreResult<Option<Bytes>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::io(&path, err)),
        }
    }

    async fn put_object(&self, key: &str, body: Bytes) -> StoreResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| StoreError::io(parent, err))?;
        }
        tokio::fs::write(&path, &body)
            .await
            .map_err(|err| StoreError::io(&path, err))
    }

    async fn delete_objects(&self, keys: &[String]) -> StoreResult<()> {
        for key in keys {
            let path = self.path_for(key)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(StoreError::io(&path, err)),
            }
        }
        Ok(())
    }
}
