//! Work queue connecting the discoverer to the fetcher.
//!
//! Delivery is at-most-once: a popped job is gone, there is no
//! acknowledgment. A job lost to a crash between pop and store write comes
//! back on the next staleness sweep of the discoverer.

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_queue;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Job;

pub use memory::MemoryQueue;
#[cfg(feature = "redis")]
pub use redis_queue::RedisQueue;

/// Queue consumed by the fetcher.
pub const FETCHER_QUEUE: &str = "fetcher";

/// Trait for named FIFO queues.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Append a job to the tail of `queue`.
    async fn push(&self, queue: &str, job: &Job) -> Result<()>;

    /// Remove the head of `queue`, waiting as long as it takes.
    async fn pop(&self, queue: &str) -> Result<Job>;

    /// Remove the head of `queue`, or `None` once `timeout` has passed.
    async fn pop_timeout(&self, queue: &str, timeout: Duration) -> Result<Option<Job>>;

    /// Jobs currently waiting in `queue`.
    async fn len(&self, queue: &str) -> Result<usize>;
}
