//! Price conversion into the local currency.

use serde_json::Value;

use crate::error::Result;
use crate::models::{CurrencyConfig, Price};

/// Rewrites foreign-currency prices of detail payloads.
#[derive(Debug, Clone)]
pub struct CurrencyNormalizer {
    foreign_unit: String,
    local_unit: String,
}

impl CurrencyNormalizer {
    pub fn new(config: &CurrencyConfig) -> Self {
        Self {
            foreign_unit: config.foreign_unit.clone(),
            local_unit: config.local_unit.clone(),
        }
    }

    /// The payload's price if it is quoted in the foreign currency.
    pub fn foreign_price(&self, content: &Value) -> Result<Option<Price>> {
        Ok(Price::from_content(content)?.filter(|p| p.is_in(&self.foreign_unit)))
    }

    /// Replace the price with `value × rate` in the local unit, rounded
    /// half to even.
    pub fn convert(&self, content: &mut Value, price: &Price, rate: f64) {
        let converted = (price.value * rate).round_ties_even() as i64;
        if let Some(obj) = content.get_mut("price").and_then(Value::as_object_mut) {
            obj.insert("unit".into(), Value::String(self.local_unit.clone()));
            obj.insert("value".into(), Value::from(converted));
        }
    }
}
