//! In-memory storage implementation.
//!
//! Used by `feedpipe run` with `store.backend = "memory"` and by tests.
//! [`Collections`] also backs the local filesystem store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::storage::DocumentStore;

/// Documents of one collection, ordered by key.
pub(crate) type Collection = BTreeMap<String, Value>;

/// What a field-level update did to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Merge {
    Missing,
    /// Every field already held the given value
    Unchanged,
    Modified,
}

impl Merge {
    pub(crate) fn found(self) -> bool {
        self != Merge::Missing
    }
}

/// Named collections with unique keys.
#[derive(Debug, Default)]
pub(crate) struct Collections {
    inner: HashMap<String, Collection>,
}

impl Collections {
    pub(crate) fn get(&self, collection: &str) -> Option<&Collection> {
        self.inner.get(collection)
    }

    pub(crate) fn replace(&mut self, collection: &str, documents: Collection) {
        self.inner.insert(collection.to_string(), documents);
    }

    pub(crate) fn find(&self, collection: &str, key: &str) -> Option<Value> {
        self.inner.get(collection)?.get(key).cloned()
    }

    pub(crate) fn insert(&mut self, collection: &str, key: &str, document: Value) -> Result<()> {
        let documents = self.inner.entry(collection.to_string()).or_default();
        if documents.contains_key(key) {
            return Err(AppError::duplicate(collection, key));
        }
        documents.insert(key.to_string(), document);
        Ok(())
    }

    pub(crate) fn update(
        &mut self,
        collection: &str,
        key: &str,
        fields: Map<String, Value>,
    ) -> Result<Merge> {
        let Some(document) = self.inner.get_mut(collection).and_then(|c| c.get_mut(key)) else {
            return Ok(Merge::Missing);
        };
        let Value::Object(existing) = document else {
            return Err(AppError::Store(format!(
                "document {key} in {collection} is not an object"
            )));
        };
        if fields.iter().all(|(k, v)| existing.get(k) == Some(v)) {
            return Ok(Merge::Unchanged);
        }
        existing.extend(fields);
        Ok(Merge::Modified)
    }

    pub(crate) fn list(&self, collection: &str, offset: usize, limit: usize) -> Vec<Value> {
        self.inner
            .get(collection)
            .map(|c| c.values().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, collection: &str) -> usize {
        self.inner.get(collection).map_or(0, |c| c.len())
    }
}

/// Process-local document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        Ok(self.collections.read().await.find(collection, key))
    }

    async fn insert(&self, collection: &str, key: &str, document: Value) -> Result<()> {
        self.collections
            .write()
            .await
            .insert(collection, key, document)
    }

    async fn update(
        &self,
        collection: &str,
        key: &str,
        fields: Map<String, Value>,
    ) -> Result<bool> {
        let merge = self
            .collections
            .write()
            .await
            .update(collection, key, fields)?;
        Ok(merge.found())
    }

    async fn list(&self, collection: &str, offset: usize, limit: usize) -> Result<Vec<Value>> {
        Ok(self.collections.read().await.list(collection, offset, limit))
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        Ok(self.collections.read().await.count(collection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_rejects_duplicate_key() {
        let store = MemoryStore::new();
        store.insert("details", "1", json!({"id": "1"})).await.unwrap();

        let err = store
            .insert("details", "1", json!({"id": "1"}))
            .await
            .unwrap_err();
        assert!(err.is_duplicate_key());
    }

    #[tokio::test]
    async fn test_same_key_in_other_collection() {
        let store = MemoryStore::new();
        store.insert("details", "1", json!({})).await.unwrap();
        store.insert("summaries", "1", json!({})).await.unwrap();
        assert_eq!(store.count("details").await.unwrap(), 1);
        assert_eq!(store.count("summaries").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_in_key_order_with_window() {
        let store = MemoryStore::new();
        for key in ["c", "a", "b", "d"] {
            store.insert("rates", key, json!({ "k": key })).await.unwrap();
        }

        let page = store.list("rates", 1, 2).await.unwrap();
        assert_eq!(page, vec![json!({"k": "b"}), json!({"k": "c"})]);
        assert!(store.list("missing", 0, 10).await.unwrap().is_empty());
    }

    #[test]
    fn test_update_reports_noop_merge() {
        let mut collections = Collections::default();
        collections
            .insert("summaries", "1", json!({"last_status": 200, "checksum": "a"}))
            .unwrap();

        let same = json!({"last_status": 200}).as_object().cloned().unwrap();
        let other = json!({"last_status": 304}).as_object().cloned().unwrap();
        assert_eq!(collections.update("summaries", "1", same).unwrap(), Merge::Unchanged);
        assert_eq!(collections.update("summaries", "1", other).unwrap(), Merge::Modified);
        assert_eq!(
            collections.update("summaries", "2", Map::new()).unwrap(),
            Merge::Missing
        );
        assert_eq!(
            collections.find("summaries", "1"),
            Some(json!({"last_status": 304, "checksum": "a"}))
        );
    }
}
