//! Redis-backed queue.
//!
//! Jobs are JSON strings in a Redis list: `RPUSH` to enqueue, `BLPOP` to
//! dequeue. Dropping a pending `BLPOP` (e.g. on shutdown) can lose the job it
//! was about to return, which is within the at-most-once contract.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::error::{AppError, Result};
use crate::models::{Job, QueueConfig};
use crate::queue::WorkQueue;

/// Named queues stored as Redis lists under a common prefix.
#[derive(Clone)]
pub struct RedisQueue {
    manager: ConnectionManager,
    namespace: String,
}

impl RedisQueue {
    /// Connect using the queue section of the configuration.
    pub async fn connect(config: &QueueConfig) -> Result<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        let manager = ConnectionManager::new(client).await?;
        log::info!("Connected to Redis queue at {}", config.redis_url);
        Ok(Self {
            manager,
            namespace: config.namespace.clone(),
        })
    }

    fn key(&self, queue: &str) -> String {
        format!("{}{}", self.namespace, queue)
    }

    async fn blocking_pop(&self, queue: &str, timeout_secs: f64) -> Result<Option<Job>> {
        let mut conn = self.manager.clone();
        let popped: Option<(String, String)> = conn.blpop(self.key(queue), timeout_secs).await?;
        match popped {
            Some((_, raw)) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl WorkQueue for RedisQueue {
    async fn push(&self, queue: &str, job: &Job) -> Result<()> {
        let raw = serde_json::to_string(job)?;
        let mut conn = self.manager.clone();
        let _: usize = conn.rpush(self.key(queue), raw).await?;
        Ok(())
    }

    async fn pop(&self, queue: &str) -> Result<Job> {
        // A zero timeout blocks indefinitely.
        self.blocking_pop(queue, 0.0)
            .await?
            .ok_or_else(|| AppError::Queue(format!("BLPOP on {queue} returned nothing")))
    }

    async fn pop_timeout(&self, queue: &str, timeout: Duration) -> Result<Option<Job>> {
        // Redis treats 0 as "forever"; keep short timeouts short.
        let secs = timeout.as_secs_f64().max(0.01);
        self.blocking_pop(queue, secs).await
    }

    async fn len(&self, queue: &str) -> Result<usize> {
        let mut conn = self.manager.clone();
        Ok(conn.llen(self.key(queue)).await?)
    }
}
