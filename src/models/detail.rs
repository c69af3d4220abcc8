//! Detail record and price payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Document;
use crate::error::{AppError, Result};

/// Fetched, currency-normalized payload of one item.
///
/// Written once; afterwards only `last_status` and `last_fetched_at` change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detail {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_fetched_at: DateTime<Utc>,
    pub content: Value,
    pub last_status: u16,
}

impl Detail {
    pub fn new(id: impl Into<String>, content: Value, last_status: u16, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            created_at: now,
            last_fetched_at: now,
            content,
            last_status,
        }
    }
}

impl Document for Detail {
    const COLLECTION: &'static str = "details";

    fn key(&self) -> String {
        self.id.clone()
    }
}

/// Status touch applied to an existing detail.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DetailStatus {
    pub last_status: u16,
    pub last_fetched_at: DateTime<Utc>,
}

/// The `price` object of a detail payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Price {
    pub unit: String,
    pub value: f64,
}

impl Price {
    /// Read `content.price`, returning `None` when the payload has no price.
    ///
    /// The API sends the value as a numeric string; plain numbers are accepted too.
    pub fn from_content(content: &Value) -> Result<Option<Self>> {
        let Some(price) = content.get("price").filter(|p| p.is_object()) else {
            return Ok(None);
        };

        let unit = price
            .get("unit")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::api("price", "missing price unit"))?
            .to_string();

        let value = match price.get("value") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .ok_or_else(|| AppError::api("price", format!("unparseable price value for unit {unit}")))?;

        Ok(Some(Self { unit, value }))
    }

    /// Whether the unit names the given currency, ignoring case.
    pub fn is_in(&self, unit: &str) -> bool {
        self.unit.to_lowercase().contains(&unit.to_lowercase())
    }
}
