// src/services/exchange.rs

//! Official exchange rate sheets.
//!
//! The source exports one semicolon-separated sheet per day. The first line
//! is the header, or a "No data" notice on days without a publication
//! (weekends, holidays). The rate sits in an unlabeled column of the row
//! naming the currency, written with a decimal comma.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::utils::http::send_text;

/// Marker the source puts on the first line of an empty sheet.
const NO_DATA: &str = "No data";

/// Trait for exchange rate sheet sources.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Fetch the raw sheet published for `date`.
    async fn rate_sheet(&self, date: NaiveDate) -> Result<String>;
}

/// Rate sheets over HTTP.
pub struct HttpRateSource {
    client: Client,
    url: String,
}

impl HttpRateSource {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn rate_sheet(&self, date: NaiveDate) -> Result<String> {
        let date_param = date.format("%d.%m.%Y").to_string();
        let request = self.client.get(&self.url).query(&[("date", &date_param)]);
        let (_, body) = send_text(request, &format!("rate sheet {date_param}")).await?;
        Ok(body)
    }
}

/// What a sheet says about the target currency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateSheet {
    /// Nothing published for that date
    NoData,
    Rate(f64),
}

/// Parse a rate sheet.
///
/// The label column is the one headed `label_column` (the first column if no
/// header matches). The value column is the last column with an empty header.
pub fn parse_rate_sheet(body: &str, currency_name: &str, label_column: &str) -> Result<RateSheet> {
    let body = body.replace('\r', "");
    let mut lines = body.lines();

    let header = lines
        .next()
        .ok_or_else(|| AppError::rate_sheet("empty sheet"))?;
    if header.contains(NO_DATA) {
        return Ok(RateSheet::NoData);
    }

    let columns: Vec<&str> = header.split(';').map(str::trim).collect();
    let label_idx = columns
        .iter()
        .position(|c| *c == label_column)
        .unwrap_or(0);
    let value_idx = columns
        .iter()
        .enumerate()
        .rev()
        .find(|(i, c)| *i != label_idx && c.is_empty())
        .map(|(i, _)| i)
        .ok_or_else(|| AppError::rate_sheet(format!("no value column in header {header:?}")))?;

    for line in lines.filter(|l| !l.trim().is_empty()) {
        let fields: Vec<&str> = line.split(';').collect();
        let Some(label) = fields.get(label_idx) else {
            continue;
        };
        if !label.contains(currency_name) {
            continue;
        }

        let raw = fields
            .get(value_idx)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::rate_sheet(format!("{currency_name} row has no value")))?;
        let value = raw
            .replace(',', ".")
            .parse::<f64>()
            .map_err(|e| AppError::rate_sheet(format!("bad {currency_name} rate {raw:?}: {e}")))?;
        return Ok(RateSheet::Rate(value));
    }

    Err(AppError::rate_sheet(format!("no row for {currency_name}")))
}
