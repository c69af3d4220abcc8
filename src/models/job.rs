//! Fetch job carried by the work queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pointer to an item that needs its detail fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub scheduled_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scheduled_at: Utc::now(),
        }
    }
}
