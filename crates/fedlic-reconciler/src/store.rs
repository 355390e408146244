//! # License Object Stores
//!
//! Persistence for [`LicenseObject`]s. Every write is conditional on the
//! object's `resource_version`:
//!
//! - version `0` creates the object and fails with `Conflict` if it exists;
//! - any other version must equal the stored one, else `Conflict`, or
//!   `NotFound` when the object is gone.
//!
//! A successful write returns the stored object with its new version.
//! Versions are store-wide and strictly increasing, so a deleted and
//! re-created object never reuses an old version.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fedlic_core::{LicenseObject, RecordKey};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

#[async_trait]
pub trait LicenseStore: Send + Sync {
    async fn get(&self, key: &RecordKey) -> Result<Option<LicenseObject>, StoreError>;

    async fn list_keys(&self) -> Result<Vec<RecordKey>, StoreError>;

    /// Conditional write; see the module docs.
    async fn put(&self, object: LicenseObject) -> Result<LicenseObject, StoreError>;

    /// Remove an object. `NotFound` if it does not exist.
    async fn delete(&self, key: &RecordKey) -> Result<(), StoreError>;
}

/// The object table and version counter shared by both store kinds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Objects {
    #[serde(default)]
    last_version: u64,
    #[serde(default)]
    objects: Vec<LicenseObject>,
    #[serde(skip)]
    index: BTreeMap<RecordKey, LicenseObject>,
}

impl Objects {
    fn from_file_form(mut self) -> Self {
        self.index = std::mem::take(&mut self.objects)
            .into_iter()
            .map(|o| (o.key(), o))
            .collect();
        if let Some(max) = self.index.values().map(|o| o.resource_version).max() {
            self.last_version = self.last_version.max(max);
        }
        self
    }

    fn to_file_form(&self) -> Self {
        Self {
            last_version: self.last_version,
            objects: self.index.values().cloned().collect(),
            index: BTreeMap::new(),
        }
    }

    fn put(&mut self, mut object: LicenseObject) -> Result<LicenseObject, StoreError> {
        let key = object.key();
        let actual = self.index.get(&key).map(|o| o.resource_version);
        match (object.resource_version, actual) {
            (0, None) => {}
            (expected, Some(actual)) if expected == actual => {}
            (_, None) => return Err(StoreError::NotFound(key)),
            (expected, Some(actual)) => {
                return Err(StoreError::Conflict {
                    key,
                    expected,
                    actual,
                })
            }
        }
        self.last_version += 1;
        object.resource_version = self.last_version;
        self.index.insert(key, object.clone());
        Ok(object)
    }

    fn delete(&mut self, key: &RecordKey) -> Result<(), StoreError> {
        self.index
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryLicenseStore {
    inner: RwLock<Objects>,
}

impl MemoryLicenseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LicenseStore for MemoryLicenseStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<LicenseObject>, StoreError> {
        Ok(self.inner.read().index.get(key).cloned())
    }

    async fn list_keys(&self) -> Result<Vec<RecordKey>, StoreError> {
        Ok(self.inner.read().index.keys().cloned().collect())
    }

    async fn put(&self, object: LicenseObject) -> Result<LicenseObject, StoreError> {
        self.inner.write().put(object)
    }

    async fn delete(&self, key: &RecordKey) -> Result<(), StoreError> {
        self.inner.write().delete(key)
    }
}

/// Store backed by one JSON file, rewritten atomically on every mutation.
#[derive(Debug)]
pub struct FileLicenseStore {
    path: PathBuf,
    inner: tokio::sync::Mutex<Objects>,
}

impl FileLicenseStore {
    /// Open the store at `path`, loading it if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let objects = match std::fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Objects::default(),
            Ok(bytes) => serde_json::from_slice::<Objects>(&bytes)
                .map_err(|e| StoreError::Codec(format!("{}: {e}", path.display())))?
                .from_file_form(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Objects::default(),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        Ok(Self {
            path,
            inner: tokio::sync::Mutex::new(objects),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy of the table, persist it, then commit it.
    async fn mutate<T>(
        &self,
        change: impl FnOnce(&mut Objects) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.inner.lock().await;
        let mut next = guard.clone();
        let out = change(&mut next)?;
        let bytes = serde_json::to_vec_pretty(&next.to_file_form())
            .map_err(|e| StoreError::Codec(e.to_string()))?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || atomic_write(&path, &bytes))
            .await
            .map_err(|e| StoreError::Transport(format!("store writer task failed: {e}")))??;
        *guard = next;
        Ok(out)
    }
}

#[async_trait]
impl LicenseStore for FileLicenseStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<LicenseObject>, StoreError> {
        Ok(self.inner.lock().await.index.get(key).cloned())
    }

    async fn list_keys(&self) -> Result<Vec<RecordKey>, StoreError> {
        Ok(self.inner.lock().await.index.keys().cloned().collect())
    }

    async fn put(&self, object: LicenseObject) -> Result<LicenseObject, StoreError> {
        self.mutate(|objects| objects.put(object)).await
    }

    async fn delete(&self, key: &RecordKey) -> Result<(), StoreError> {
        self.mutate(|objects| objects.delete(key)).await
    }
}

/// Write `bytes` to `path` via a temp file in the same directory, fsync,
/// then rename.
fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.display().to_string(),
        source,
    };
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.as_file_mut().write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
