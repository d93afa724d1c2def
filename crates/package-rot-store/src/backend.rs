//! Record store abstractions
//!
//! This module defines the [`RecordStore`] trait the cache persists snapshots
//! through, together with a filesystem implementation (one JSON document per
//! package, written atomically) and an in-memory implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Envelope persisted for each package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// When the registry was queried
    pub fetched_at: DateTime<Utc>,

    /// The record in catalog wire shape
    pub record: serde_json::Value,
}

impl StoredRecord {
    pub fn new(fetched_at: DateTime<Utc>, record: serde_json::Value) -> Self {
        Self { fetched_at, record }
    }

    /// Decode an envelope, mapping any failure to [`StoreError::Corrupted`]
    pub fn decode(key: &str, bytes: &[u8]) -> StoreResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupted {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

/// Persistence for cached records, keyed by package name
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load the entry for a package.
    ///
    /// Returns `Ok(None)` when nothing is stored and
    /// [`StoreError::Corrupted`] when an entry exists but cannot be decoded.
    async fn load(&self, name: &str) -> StoreResult<Option<StoredRecord>>;

    /// Replace the entry for a package
    async fn save(&self, name: &str, entry: &StoredRecord) -> StoreResult<()>;
}

/// Stores each record as `{root}/project/{name}.json`
#[derive(Debug, Clone)]
pub struct FileSystemStore {
    root: PathBuf,
}

impl FileSystemStore {
    /// Sub-directory holding project entries
    pub const PROJECT_DIR: &'static str = "project";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the entry for a package
    pub fn entry_path(&self, name: &str) -> StoreResult<PathBuf> {
        let file = encode_key(name)?;
        Ok(self
            .root
            .join(Self::PROJECT_DIR)
            .join(format!("{}.json", file)))
    }

    async fn write_atomically(&self, path: &Path, bytes: &[u8]) -> StoreResult<()> {
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::Configuration(format!("No parent for {}", path.display())))?;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| StoreError::io(dir, e))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        let result = async {
            let mut file = tokio::fs::File::create(&tmp)
                .await
                .map_err(|e| StoreError::io(&tmp, e))?;
            file.write_all(bytes)
                .await
                .map_err(|e| StoreError::io(&tmp, e))?;
            file.sync_all().await.map_err(|e| StoreError::io(&tmp, e))?;
            drop(file);

            tokio::fs::rename(&tmp, path)
                .await
                .map_err(|e| StoreError::io(path, e))
        }
        .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        result
    }
}

#[async_trait]
impl RecordStore for FileSystemStore {
    async fn load(&self, name: &str) -> StoreResult<Option<StoredRecord>> {
        let path = self.entry_path(name)?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => StoredRecord::decode(name, &bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    async fn save(&self, name: &str, entry: &StoredRecord) -> StoreResult<()> {
        let path = self.entry_path(name)?;
        let bytes = entry.encode()?;
        self.write_atomically(&path, &bytes).await?;
        debug!("Stored {} ({} bytes) at {}", name, bytes.len(), path.display());
        Ok(())
    }
}

/// Keeps encoded entries in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put raw bytes under a key, bypassing encoding
    pub fn insert_raw(&self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.into(), bytes.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn load(&self, name: &str) -> StoreResult<Option<StoredRecord>> {
        let bytes = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned();

        bytes
            .map(|bytes| StoredRecord::decode(name, &bytes))
            .transpose()
    }

    async fn save(&self, name: &str, entry: &StoredRecord) -> StoreResult<()> {
        let bytes = entry.encode()?;
        self.insert_raw(name, bytes);
        Ok(())
    }
}

/// Map a package name onto a safe file stem.
///
/// Registry names are `[A-Za-z0-9._-]`; anything else is percent-encoded so
/// distinct names never collide and never escape the store directory.
fn encode_key(name: &str) -> StoreResult<String> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(StoreError::InvalidKey(name.to_string()));
    }

    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                encoded.push(byte as char)
            }
            other => encoded.push_str(&format!("%{:02X}", other)),
        }
    }

    if encoded.starts_with('.') {
        encoded.replace_range(0..1, "%2E");
    }
    Ok(encoded)
}
