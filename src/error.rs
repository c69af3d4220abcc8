// src/error.rs

//! Unified error handling for the pipeline.

use std::fmt;

use chrono::NaiveDate;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Redis command failed
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unique key already taken in a collection
    #[error("Duplicate key '{key}' in {collection}")]
    DuplicateKey { collection: String, key: String },

    /// Concurrent write collided; safe to retry
    #[error("Write conflict: {0}")]
    WriteConflict(String),

    /// Document store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Work queue failure
    #[error("Queue error: {0}")]
    Queue(String),

    /// Listing or detail API returned something unusable
    #[error("API error for {context}: {message}")]
    Api { context: String, message: String },

    /// Exchange rate sheet could not be parsed
    #[error("Rate sheet error: {0}")]
    RateSheet(String),

    /// No rate found within the lookback window
    #[error("No exchange rate for {requested} within {lookback_days} days")]
    RateUnavailable {
        requested: NaiveDate,
        lookback_days: u32,
    },

    /// Retry budget spent
    #[error("Gave up after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a duplicate key error.
    pub fn duplicate(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self::DuplicateKey {
            collection: collection.into(),
            key: key.into(),
        }
    }

    /// Create an API error with context.
    pub fn api(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Api {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a rate sheet error.
    pub fn rate_sheet(message: impl Into<String>) -> Self {
        Self::RateSheet(message.into())
    }

    /// Whether an insert lost a race on a unique key.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }

    /// Whether a write collided with another writer.
    pub fn is_write_conflict(&self) -> bool {
        matches!(self, Self::WriteConflict(_))
    }
}
