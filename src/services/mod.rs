//! Service layer for the pipeline.
//!
//! This module contains the external collaborators and the logic built on them:
//! - Partner API access (`MarketplaceApi`)
//! - Exchange rate sheets (`RateSource`)
//! - Cached rate lookup with date fallback (`RateResolver`)
//! - Price conversion (`CurrencyNormalizer`)

mod api;
mod currency;
mod exchange;
mod rates;

pub use api::{DetailPayload, HttpMarketplaceApi, ListingPage, MarketplaceApi, item_id, page_count};
pub use currency::CurrencyNormalizer;
pub use exchange::{HttpRateSource, RateSheet, RateSource, parse_rate_sheet};
pub use rates::RateResolver;
