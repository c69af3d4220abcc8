// src/pipeline/fetch.rs

//! Detail fetching.
//!
//! Jobs are popped from the `fetcher` queue in batches. Each job becomes a
//! task in a `JoinSet`, gated by a semaphore so that at most
//! `max_concurrent` detail requests are in flight. Popping waits whenever
//! every permit is taken.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{Detail, DetailStatus, FetchConfig, Summary};
use crate::pipeline::ticker::Ticker;
use crate::queue::{FETCHER_QUEUE, WorkQueue};
use crate::services::{CurrencyNormalizer, MarketplaceApi, RateResolver};
use crate::storage::{InsertOutcome, Records};
use crate::utils::{RetryPolicy, retry};

/// What processing one item did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOutcome {
    Inserted,
    /// Another worker stored the detail first
    AlreadyPresent,
    /// Detail existed; only its status was touched
    StatusUpdated,
}

/// Tally of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub launched: usize,
    pub skipped: usize,
    pub inserted: usize,
    pub already_present: usize,
    pub status_updated: usize,
    pub failed: usize,
}

impl BatchReport {
    fn record(&mut self, joined: std::result::Result<Result<FetchOutcome>, JoinError>) {
        match joined {
            Ok(Ok(FetchOutcome::Inserted)) => self.inserted += 1,
            Ok(Ok(FetchOutcome::AlreadyPresent)) => self.already_present += 1,
            Ok(Ok(FetchOutcome::StatusUpdated)) => self.status_updated += 1,
            Ok(Err(_)) => self.failed += 1,
            Err(e) => {
                log::error!("Fetch task died: {}", e);
                self.failed += 1;
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.launched == 0 && self.skipped == 0
    }
}

/// Pulls jobs off the queue and stores normalized details.
pub struct Fetcher {
    api: Arc<dyn MarketplaceApi>,
    records: Records,
    queue: Arc<dyn WorkQueue>,
    resolver: RateResolver,
    normalizer: CurrencyNormalizer,
    config: FetchConfig,
    retry: RetryPolicy,
    permits: Arc<Semaphore>,
}

impl Fetcher {
    pub fn new(
        api: Arc<dyn MarketplaceApi>,
        records: Records,
        queue: Arc<dyn WorkQueue>,
        resolver: RateResolver,
        normalizer: CurrencyNormalizer,
        config: FetchConfig,
        retry: RetryPolicy,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            api,
            records,
            queue,
            resolver,
            normalizer,
            config,
            retry,
            permits,
        }
    }

    /// Run batches until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let pause = Ticker::new(Duration::from_secs(self.config.pause_secs), cancel.clone());
        log::info!(
            "Fetcher started (up to {} concurrent requests)",
            self.config.max_concurrent
        );

        while !pause.is_cancelled() {
            match self.run_batch(&cancel).await {
                Ok(report) if report.is_empty() => log::debug!("Fetch queue idle"),
                Ok(report) => log::info!(
                    "Batch done: {} launched, {} inserted, {} already present, {} status updates, {} failed, {} skipped",
                    report.launched,
                    report.inserted,
                    report.already_present,
                    report.status_updated,
                    report.failed,
                    report.skipped
                ),
                Err(e) => log::error!("Fetch batch failed: {}", e),
            }

            if !pause.wait().await {
                break;
            }
        }

        log::info!("Fetcher stopped");
    }

    /// Launch up to `batch_size` jobs, then wait for all of them.
    ///
    /// The batch also closes early when the queue stays empty for
    /// `idle_timeout_secs` or on cancellation. Launched tasks are always
    /// drained before returning.
    pub async fn run_batch(self: &Arc<Self>, cancel: &CancellationToken) -> Result<BatchReport> {
        let mut tasks = JoinSet::new();
        let mut report = BatchReport::default();

        let launched = self.launch(&mut tasks, &mut report, cancel).await;

        while let Some(joined) = tasks.join_next().await {
            report.record(joined);
        }

        launched.map(|()| report)
    }

    async fn launch(
        self: &Arc<Self>,
        tasks: &mut JoinSet<Result<FetchOutcome>>,
        report: &mut BatchReport,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let idle = Duration::from_secs(self.config.idle_timeout_secs);

        while report.launched < self.config.batch_size {
            let popped = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                popped = self.queue.pop_timeout(FETCHER_QUEUE, idle) => popped?,
            };
            let Some(job) = popped else {
                break;
            };

            while let Some(joined) = tasks.try_join_next() {
                report.record(joined);
            }

            let summary = match self.records.find::<Summary>(&job.id).await {
                Ok(Some(summary)) => summary,
                Ok(None) => {
                    log::warn!("No summary for job {}, skipping", job.id);
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    log::error!("Cannot load summary for job {}, skipping: {}", job.id, e);
                    report.skipped += 1;
                    continue;
                }
            };

            let permit = Arc::clone(&self.permits)
                .acquire_owned()
                .await
                .map_err(|_| AppError::Queue("fetch permits closed".into()))?;

            let fetcher = Arc::clone(self);
            tasks.spawn(async move {
                let _permit = permit;
                let result = fetcher.process(&summary).await;
                if let Err(e) = &result {
                    log::error!("Failed to fetch detail {}: {}", summary.id, e);
                }
                result
            });
            report.launched += 1;
        }

        Ok(())
    }

    /// Fetch and store the detail of one item.
    pub async fn process(&self, summary: &Summary) -> Result<FetchOutcome> {
        let payload = self.api.detail(&summary.id).await?;
        let now = Utc::now();

        if self.records.find::<Detail>(&summary.id).await?.is_some() {
            let status = DetailStatus {
                last_status: payload.status,
                last_fetched_at: now,
            };
            self.update_status(&summary.id, &status).await?;
            return Ok(FetchOutcome::StatusUpdated);
        }

        let mut content = payload.content;
        if let Some(price) = self.normalizer.foreign_price(&content)? {
            let rate = self.resolver.resolve_today().await?;
            log::debug!(
                "Converting {} {} at {} for {}",
                price.value,
                price.unit,
                rate,
                summary.id
            );
            self.normalizer.convert(&mut content, &price, rate);
        }

        let detail = Detail::new(summary.id.clone(), content, payload.status, now);
        match self.records.insert(&detail).await? {
            InsertOutcome::Inserted => Ok(FetchOutcome::Inserted),
            InsertOutcome::AlreadyExists => Ok(FetchOutcome::AlreadyPresent),
        }
    }

    async fn update_status(&self, id: &str, status: &DetailStatus) -> Result<()> {
        let records = &self.records;
        retry(self.retry, AppError::is_write_conflict, move || async move {
            records.update::<Detail>(id, status).await
        })
        .await?;
        Ok(())
    }
}
