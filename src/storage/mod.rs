//! Document store abstractions.
//!
//! The pipeline needs three things from a store: find by key, insert with
//! duplicate detection, and a field-level update by key. Everything else
//! (listing, counting) only serves the CLI.
//!
//! ## Collections
//!
//! ```text
//! summaries   # key: item id   (written by the discoverer)
//! details     # key: item id   (written by the fetcher)
//! rates       # key: date      (written by the rate resolver)
//! ```

pub mod local;
pub mod memory;
pub mod page;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::models::Document;

// Re-export for convenience
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use page::{Page, PageRequest};

/// Trait for document store backends.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Find the document stored under `key`.
    async fn find(&self, collection: &str, key: &str) -> Result<Option<Value>>;

    /// Insert a new document.
    ///
    /// Fails with [`AppError::DuplicateKey`] when `key` is already taken.
    async fn insert(&self, collection: &str, key: &str, document: Value) -> Result<()>;

    /// Overwrite the given top-level fields of an existing document.
    ///
    /// Returns `false` when no document exists under `key`.
    async fn update(&self, collection: &str, key: &str, fields: Map<String, Value>)
    -> Result<bool>;

    /// Documents in key order.
    async fn list(&self, collection: &str, offset: usize, limit: usize) -> Result<Vec<Value>>;

    /// Number of documents in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;
}

/// Result of an insert that tolerates a lost race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Another writer got there first; the stored record stands.
    AlreadyExists,
}

/// Typed access to a [`DocumentStore`].
#[derive(Clone)]
pub struct Records {
    store: Arc<dyn DocumentStore>,
}

impl Records {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub async fn find<T: Document>(&self, key: &str) -> Result<Option<T>> {
        match self.store.find(T::COLLECTION, key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Insert a record, treating a duplicate key as success.
    pub async fn insert<T: Document>(&self, record: &T) -> Result<InsertOutcome> {
        let key = record.key();
        let value = serde_json::to_value(record)?;
        match self.store.insert(T::COLLECTION, &key, value).await {
            Ok(()) => Ok(InsertOutcome::Inserted),
            Err(e) if e.is_duplicate_key() => {
                log::debug!("{} {} already exists", T::COLLECTION, key);
                Ok(InsertOutcome::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }

    /// Apply a partial update to the record stored under `key`.
    pub async fn update<T: Document>(&self, key: &str, fields: &impl Serialize) -> Result<bool> {
        let fields = match serde_json::to_value(fields)? {
            Value::Object(map) => map,
            other => {
                return Err(AppError::Store(format!(
                    "update for {} must be an object, got {}",
                    T::COLLECTION,
                    other
                )));
            }
        };
        self.store.update(T::COLLECTION, key, fields).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Summary, SummaryUpdate};
    use chrono::Utc;
    use serde_json::json;

    #[tokio::test]
    async fn test_typed_round_trip_and_duplicate() {
        let records = Records::new(Arc::new(MemoryStore::new()));
        let summary = Summary::new("7", "c1", json!({"id": 7}), 200, Utc::now());

        assert_eq!(records.insert(&summary).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(
            records.insert(&summary).await.unwrap(),
            InsertOutcome::AlreadyExists
        );

        let found: Summary = records.find("7").await.unwrap().unwrap();
        assert_eq!(found, summary);
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let records = Records::new(Arc::new(MemoryStore::new()));
        let summary = Summary::new("7", "c1", json!({"id": 7}), 200, Utc::now());
        records.insert(&summary).await.unwrap();

        let update = SummaryUpdate {
            last_status: 304,
            ..SummaryUpdate::default()
        };
        assert!(records.update::<Summary>("7", &update).await.unwrap());

        let found: Summary = records.find("7").await.unwrap().unwrap();
        assert_eq!(found.last_status, 304);
        assert_eq!(found.checksum, "c1");
        assert_eq!(found.content, json!({"id": 7}));
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let records = Records::new(Arc::new(MemoryStore::new()));
        let update = SummaryUpdate::default();
        assert!(!records.update::<Summary>("nope", &update).await.unwrap());
    }
}
