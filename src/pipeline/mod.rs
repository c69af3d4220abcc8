//! Pipeline stages and their wiring.
//!
//! - `Discoverer`: sweeps the listing and enqueues items that need a fetch
//! - `Fetcher`: drains the queue and stores currency-normalized details

pub mod diff;
pub mod discover;
pub mod fetch;
pub mod runner;
pub mod ticker;

pub use diff::{Change, ChangeDetector};
pub use discover::{Discoverer, SweepReport};
pub use fetch::{BatchReport, FetchOutcome, Fetcher};
pub use runner::{Services, Stats, run_all};
pub use ticker::Ticker;
