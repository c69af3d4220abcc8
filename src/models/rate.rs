//! Cached exchange rate.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Document;

/// Conversion factor published for one calendar date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateRecord {
    pub date: NaiveDate,
    pub currency: String,
    pub value: f64,
}

impl RateRecord {
    /// Store key for a date (`YYYY-MM-DD`).
    pub fn key_for(date: NaiveDate) -> String {
        date.format("%Y-%m-%d").to_string()
    }
}

impl Document for RateRecord {
    const COLLECTION: &'static str = "rates";

    fn key(&self) -> String {
        Self::key_for(self.date)
    }
}
