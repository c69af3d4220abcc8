//! Store doubles for tests.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::storage::{DocumentStore, MemoryStore};

/// Memory store where another writer always wins the insert race on one
/// collection: `find` there reports nothing, while `insert` of a key that
/// is already stored fails with a duplicate key.
pub(crate) struct LostRaceStore {
    pub(crate) inner: MemoryStore,
    racing: &'static str,
}

impl LostRaceStore {
    pub(crate) fn new(racing: &'static str) -> Self {
        Self {
            inner: MemoryStore::new(),
            racing,
        }
    }
}

#[async_trait]
impl DocumentStore for LostRaceStore {
    async fn find(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        if collection == self.racing {
            return Ok(None);
        }
        self.inner.find(collection, key).await
    }

    async fn insert(&self, collection: &str, key: &str, document: Value) -> Result<()> {
        if collection == self.racing && self.inner.find(collection, key).await?.is_some() {
            return Err(AppError::duplicate(collection, key));
        }
        self.inner.insert(collection, key, document).await
    }

    async fn update(
        &self,
        collection: &str,
        key: &str,
        fields: Map<String, Value>,
    ) -> Result<bool> {
        self.inner.update(collection, key, fields).await
    }

    async fn list(&self, collection: &str, offset: usize, limit: usize) -> Result<Vec<Value>> {
        self.inner.list(collection, offset, limit).await
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.inner.count(collection).await
    }
}
