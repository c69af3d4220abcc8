//! Change detection for listing items.
//!
//! Compares a freshly observed item against its stored summary to decide
//! whether the item must be (re)fetched and what to write back.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::models::{Summary, SummaryUpdate};

/// How an observed item relates to what is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Change {
    /// No summary stored yet
    New,
    /// Checksum differs from the stored one
    Changed,
    /// Same checksum, but not pushed to the fetcher within the refresh interval
    Stale,
    Unchanged,
}

impl Change {
    /// Whether the item should be handed to the fetcher.
    pub fn needs_fetch(self) -> bool {
        !matches!(self, Change::Unchanged)
    }
}

/// Classifier for observed items.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    refresh_interval: Duration,
}

impl ChangeDetector {
    pub fn new(refresh_interval: Duration) -> Self {
        Self { refresh_interval }
    }

    /// Classify an item given its stored summary, if any.
    ///
    /// A change in checksum wins over staleness.
    pub fn classify(&self, stored: Option<&Summary>, checksum: &str, now: DateTime<Utc>) -> Change {
        let Some(stored) = stored else {
            return Change::New;
        };

        if stored.checksum != checksum {
            Change::Changed
        } else if stored.last_fetched_at <= now - self.refresh_interval {
            Change::Stale
        } else {
            Change::Unchanged
        }
    }

    /// Fields to write back for an item that already has a summary.
    ///
    /// `last_fetched_at` never moves backwards.
    pub fn update_for(
        &self,
        change: Change,
        stored: &Summary,
        item: &Value,
        checksum: &str,
        status: u16,
        now: DateTime<Utc>,
    ) -> SummaryUpdate {
        let fetched_at = stored.last_fetched_at.max(now);
        match change {
            Change::New | Change::Changed => SummaryUpdate {
                checksum: Some(checksum.to_string()),
                content: Some(item.clone()),
                last_fetched_at: Some(fetched_at),
                last_status: status,
            },
            Change::Stale => SummaryUpdate {
                last_fetched_at: Some(fetched_at),
                last_status: status,
                ..SummaryUpdate::default()
            },
            Change::Unchanged => SummaryUpdate {
                last_status: status,
                ..SummaryUpdate::default()
            },
        }
    }
}
