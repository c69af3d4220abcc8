// src/models/mod.rs

//! Domain models for the pipeline.
//!
//! Records persisted in the document store implement [`Document`], which ties
//! a type to its collection and unique key.

mod config;
mod detail;
mod job;
mod rate;
mod summary;

use serde::{Serialize, de::DeserializeOwned};

// Re-export all public types
pub use config::{
    ApiConfig, ChecksumScope, Config, CurrencyConfig, DiscoverConfig, FetchConfig, HttpConfig,
    QueueBackend, QueueConfig, RatesConfig, StoreBackend, StoreConfig,
};
pub use detail::{Detail, DetailStatus, Price};
pub use job::Job;
pub use rate::RateRecord;
pub use summary::{Summary, SummaryUpdate};

/// A record stored under a unique key in a named collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    /// Collection the record lives in.
    const COLLECTION: &'static str;

    /// Unique key within the collection.
    fn key(&self) -> String;
}
