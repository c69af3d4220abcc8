//! Local filesystem storage implementation.
//!
//! Each collection is one JSON object file keyed by document key. A loaded
//! collection is reused only while its file keeps the same modification time
//! and length; otherwise it is read again before the operation, so separate
//! `discover` and `fetch` processes sharing a directory see each other's
//! writes. Mutations rewrite the file atomically, and updates that change
//! nothing are not written at all.
//!
//! Writes are read-modify-write without a cross-process lock. Each
//! collection should have one writing process: `summaries` belongs to the
//! discoverer, `details` and `rates` to the fetcher.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── summaries.json
//! ├── details.json
//! └── rates.json
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::storage::DocumentStore;
use crate::storage::memory::{Collection, Collections, Merge};

/// Identity of a collection file as last seen by this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
}

#[derive(Default)]
struct State {
    collections: Collections,
    /// `None` when the file did not exist at load time.
    stamps: HashMap<String, Option<FileStamp>>,
}

/// Local filesystem storage backend.
pub struct LocalStore {
    root_dir: PathBuf,
    state: Mutex<State>,
}

impl LocalStore {
    /// Create a new LocalStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Get the file path for a collection.
    fn path(&self, collection: &str) -> PathBuf {
        self.root_dir.join(format!("{collection}.json"))
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, collection: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(collection);
        tokio::fs::create_dir_all(&self.root_dir).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Read a collection file, returning an empty collection if it doesn't exist.
    async fn read_collection(&self, collection: &str) -> Result<Collection> {
        let path = self.path(collection);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Collection::new()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn stamp(&self, collection: &str) -> Result<Option<FileStamp>> {
        match tokio::fs::metadata(self.path(collection)).await {
            Ok(meta) => Ok(Some(FileStamp {
                modified: meta.modified()?,
                len: meta.len(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Load a collection, or reload it if the file changed since the last load.
    async fn refresh(&self, state: &mut State, collection: &str) -> Result<()> {
        let stamp = self.stamp(collection).await?;
        let loaded = state.collections.get(collection).is_some();
        if loaded && state.stamps.get(collection) == Some(&stamp) {
            return Ok(());
        }

        let documents = self.read_collection(collection).await?;
        log::debug!(
            "Loaded {} documents from {}",
            documents.len(),
            self.path(collection).display()
        );
        state.collections.replace(collection, documents);
        state.stamps.insert(collection.to_string(), stamp);
        Ok(())
    }

    async fn persist(&self, state: &mut State, collection: &str) -> Result<()> {
        let empty = Collection::new();
        let documents = state.collections.get(collection).unwrap_or(&empty);
        let bytes = serde_json::to_vec_pretty(documents)?;
        self.write_bytes(collection, &bytes).await?;

        let stamp = self.stamp(collection).await?;
        state.stamps.insert(collection.to_string(), stamp);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for LocalStore {
    async fn find(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        let mut state = self.state.lock().await;
        self.refresh(&mut state, collection).await?;
        Ok(state.collections.find(collection, key))
    }

    async fn insert(&self, collection: &str, key: &str, document: Value) -> Result<()> {
        let mut state = self.state.lock().await;
        self.refresh(&mut state, collection).await?;
        state.collections.insert(collection, key, document)?;
        self.persist(&mut state, collection).await
    }

    async fn update(
        &self,
        collection: &str,
        key: &str,
        fields: Map<String, Value>,
    ) -> Result<bool> {
        let mut state = self.state.lock().await;
        self.refresh(&mut state, collection).await?;
        let merge = state.collections.update(collection, key, fields)?;
        if merge == Merge::Modified {
            self.persist(&mut state, collection).await?;
        }
        Ok(merge.found())
    }

    async fn list(&self, collection: &str, offset: usize, limit: usize) -> Result<Vec<Value>> {
        let mut state = self.state.lock().await;
        self.refresh(&mut state, collection).await?;
        Ok(state.collections.list(collection, offset, limit))
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let mut state = self.state.lock().await;
        self.refresh(&mut state, collection).await?;
        Ok(state.collections.count(collection))
    }
}
