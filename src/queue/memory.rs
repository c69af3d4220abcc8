//! In-process queue.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::error::Result;
use crate::models::Job;
use crate::queue::WorkQueue;

/// FIFO queues held in memory.
///
/// Jobs are stored serialized, the same as on a durable backend, so the
/// wire format is exercised in tests.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
    pushed: Notify,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    async fn try_pop(&self, queue: &str) -> Result<Option<Job>> {
        let mut queues = self.queues.lock().await;
        match queues.get_mut(queue).and_then(VecDeque::pop_front) {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl WorkQueue for MemoryQueue {
    async fn push(&self, queue: &str, job: &Job) -> Result<()> {
        let raw = serde_json::to_string(job)?;
        self.queues
            .lock()
            .await
            .entry(queue.to_string())
            .or_default()
            .push_back(raw);
        self.pushed.notify_waiters();
        Ok(())
    }

    async fn pop(&self, queue: &str) -> Result<Job> {
        loop {
            // Register interest before checking so a push in between is not missed.
            let notified = self.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(job) = self.try_pop(queue).await? {
                return Ok(job);
            }
            notified.await;
        }
    }

    async fn pop_timeout(&self, queue: &str, timeout: Duration) -> Result<Option<Job>> {
        match tokio::time::timeout(timeout, self.pop(queue)).await {
            Ok(job) => job.map(Some),
            Err(_) => Ok(None),
        }
    }

    async fn len(&self, queue: &str) -> Result<usize> {
        Ok(self.queues.lock().await.get(queue).map_or(0, VecDeque::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = MemoryQueue::new();
        for id in ["A", "B", "C"] {
            queue.push("fetcher", &Job::new(id)).await.unwrap();
        }

        let mut popped = Vec::new();
        for _ in 0..3 {
            popped.push(queue.pop("fetcher").await.unwrap().id);
        }
        assert_eq!(popped, vec!["A", "B", "C"]);
        assert_eq!(queue.len("fetcher").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pop_blocks_until_push() {
        let queue = Arc::new(MemoryQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop("fetcher").await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!consumer.is_finished());

        queue.push("fetcher", &Job::new("late")).await.unwrap();
        let job = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(job.id, "late");
    }

    #[tokio::test]
    async fn test_pop_timeout_on_empty_queue() {
        let queue = MemoryQueue::new();
        let job = queue
            .pop_timeout("fetcher", Duration::from_millis(20))
            .await
            .unwrap();
        assert!(job.is_none());
    }

    #[tokio::test]
    async fn test_popped_job_is_not_redelivered() {
        let queue = MemoryQueue::new();
        queue.push("fetcher", &Job::new("once")).await.unwrap();

        // Consumer takes the job and "crashes" before doing anything with it.
        drop(queue.pop("fetcher").await.unwrap());

        let again = queue
            .pop_timeout("fetcher", Duration::from_millis(20))
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_queues_are_independent() {
        let queue = MemoryQueue::new();
        queue.push("a", &Job::new("1")).await.unwrap();
        assert_eq!(queue.len("a").await.unwrap(), 1);
        assert_eq!(queue.len("b").await.unwrap(), 0);
    }
}
