// src/services/rates.rs

//! Daily exchange rate resolution.
//!
//! Rates are cached in the `rates` collection under the date they were
//! published for. When the source has nothing for a date, the previous
//! calendar day is tried, up to `max_lookback_days` steps back.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};

use crate::error::{AppError, Result};
use crate::models::{RateRecord, RatesConfig};
use crate::services::exchange::{RateSheet, RateSource, parse_rate_sheet};
use crate::storage::{InsertOutcome, Records};

/// Looks up conversion rates, filling the cache from the rate source.
#[derive(Clone)]
pub struct RateResolver {
    records: Records,
    source: Arc<dyn RateSource>,
    config: RatesConfig,
}

impl RateResolver {
    pub fn new(records: Records, source: Arc<dyn RateSource>, config: RatesConfig) -> Self {
        Self {
            records,
            source,
            config,
        }
    }

    /// Rate for today (UTC).
    pub async fn resolve_today(&self) -> Result<f64> {
        self.resolve(Utc::now().date_naive()).await
    }

    /// Rate for `date`, or for the nearest earlier date with a publication.
    pub async fn resolve(&self, date: NaiveDate) -> Result<f64> {
        let mut candidate = date;

        for step in 0..=self.config.max_lookback_days {
            if step > 0 {
                candidate = candidate
                    .checked_sub_days(Days::new(1))
                    .ok_or_else(|| AppError::validation(format!("no date before {candidate}")))?;
            }

            if let Some(cached) = self
                .records
                .find::<RateRecord>(&RateRecord::key_for(candidate))
                .await?
            {
                log::debug!("Found cached rate {} for {}", cached.value, candidate);
                return Ok(cached.value);
            }

            let sheet = self.source.rate_sheet(candidate).await?;
            match parse_rate_sheet(&sheet, &self.config.currency_name, &self.config.label_column)? {
                RateSheet::NoData => {
                    log::info!("No rate published for {}, trying the day before", candidate);
                }
                RateSheet::Rate(value) => {
                    self.store(candidate, value).await?;
                    return Ok(value);
                }
            }
        }

        Err(AppError::RateUnavailable {
            requested: date,
            lookback_days: self.config.max_lookback_days,
        })
    }

    async fn store(&self, date: NaiveDate, value: f64) -> Result<()> {
        let record = RateRecord {
            date,
            currency: self.config.currency_name.clone(),
            value,
        };
        match self.records.insert(&record).await? {
            InsertOutcome::Inserted => log::info!("Cached {} rate {} for {}", record.currency, value, date),
            InsertOutcome::AlreadyExists => {
                log::debug!("Rate for {} cached by another resolver", date)
            }
        }
        Ok(())
    }
}
