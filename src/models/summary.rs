//! Listing summary record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Document;

/// Latest observed listing state of one item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    /// External item id
    pub id: String,

    /// Hash used to detect upstream changes
    pub checksum: String,

    pub created_at: DateTime<Utc>,

    /// Last time the item was pushed to the fetcher
    pub last_fetched_at: DateTime<Utc>,

    /// Raw listing snapshot
    pub content: Value,

    /// HTTP status of the listing page the item was last seen on
    pub last_status: u16,
}

impl Summary {
    /// A summary for an item seen for the first time.
    ///
    /// `last_fetched_at` starts at the epoch so the item counts as stale
    /// until the fetcher has been asked for it.
    pub fn new(
        id: impl Into<String>,
        checksum: impl Into<String>,
        content: Value,
        last_status: u16,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            checksum: checksum.into(),
            created_at: now,
            last_fetched_at: DateTime::<Utc>::UNIX_EPOCH,
            content,
            last_status,
        }
    }
}

impl Document for Summary {
    const COLLECTION: &'static str = "summaries";

    fn key(&self) -> String {
        self.id.clone()
    }
}

/// Partial update of a summary; unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SummaryUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fetched_at: Option<DateTime<Utc>>,

    pub last_status: u16,
}
