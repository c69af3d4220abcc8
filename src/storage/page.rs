//! Paged browsing of stored collections.

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::storage::DocumentStore;

/// Bookkeeping fields not shown when browsing.
pub const HIDDEN_FIELDS: &[&str] = &["checksum", "created_at", "last_fetched_at"];

/// Requested page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub per_page: usize,
}

impl PageRequest {
    pub const DEFAULT_PER_PAGE: usize = 10;
    pub const MAX_PER_PAGE: usize = 100;

    /// Build a request, clamping out-of-range values.
    pub fn new(page: Option<usize>, per_page: Option<usize>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page
                .unwrap_or(Self::DEFAULT_PER_PAGE)
                .clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> usize {
        self.per_page.saturating_mul(self.page - 1)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of documents.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub data: Vec<Value>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub offset: usize,
}

/// Fetch one page of a collection with bookkeeping fields removed.
pub async fn browse(
    store: &dyn DocumentStore,
    collection: &str,
    request: PageRequest,
) -> Result<Page> {
    let offset = request.offset();
    let total = store.count(collection).await?;
    let data = store
        .list(collection, offset, request.per_page)
        .await?
        .into_iter()
        .map(strip_hidden)
        .collect();

    Ok(Page {
        data,
        page: request.page,
        per_page: request.per_page,
        total,
        offset,
    })
}

/// Remove bookkeeping fields from a document.
pub fn strip_hidden(mut document: Value) -> Value {
    if let Value::Object(map) = &mut document {
        for field in HIDDEN_FIELDS {
            map.remove(*field);
        }
    }
    document
}
