//! Utility functions and helpers.

pub mod checksum;
pub mod http;
pub mod retry;

pub use checksum::{canonical_checksum, checksum};
pub use retry::{RetryPolicy, retry};
