// src/pipeline/discover.rs

//! Listing sweeps.
//!
//! A sweep walks every page of the listing endpoint, compares each item with
//! its stored summary and hands new, changed and stale items to the fetcher.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{ChecksumScope, DiscoverConfig, Job, Summary, SummaryUpdate};
use crate::pipeline::diff::{Change, ChangeDetector};
use crate::pipeline::ticker::Ticker;
use crate::queue::{FETCHER_QUEUE, WorkQueue};
use crate::services::{ListingPage, MarketplaceApi, item_id, page_count};
use crate::storage::{InsertOutcome, Records};
use crate::utils::{RetryPolicy, canonical_checksum, checksum, retry};

/// Tally of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub pages: usize,
    pub seen: usize,
    pub inserted: usize,
    pub changed: usize,
    pub refreshed: usize,
    pub unchanged: usize,
    pub enqueued: usize,
    pub failed: usize,
}

impl SweepReport {
    fn record(&mut self, change: Change, enqueued: bool) {
        match change {
            Change::New => self.inserted += 1,
            Change::Changed => self.changed += 1,
            Change::Stale => self.refreshed += 1,
            Change::Unchanged => self.unchanged += 1,
        }
        if enqueued {
            self.enqueued += 1;
        }
    }
}

/// Polls the listing endpoint and keeps summaries current.
pub struct Discoverer {
    api: Arc<dyn MarketplaceApi>,
    records: Records,
    queue: Arc<dyn WorkQueue>,
    config: DiscoverConfig,
    detector: ChangeDetector,
    retry: RetryPolicy,
}

impl Discoverer {
    pub fn new(
        api: Arc<dyn MarketplaceApi>,
        records: Records,
        queue: Arc<dyn WorkQueue>,
        config: DiscoverConfig,
        retry: RetryPolicy,
    ) -> Self {
        let detector = ChangeDetector::new(config.refresh_interval());
        Self {
            api,
            records,
            queue,
            config,
            detector,
            retry,
        }
    }

    /// Sweep until cancelled, pausing `interval_secs` between sweeps.
    pub async fn run(&self, cancel: CancellationToken) {
        let ticker = Ticker::new(self.config.interval(), cancel);
        log::info!(
            "Discoverer started (every {}s, {} items per page)",
            self.config.interval_secs,
            self.config.page_size
        );

        while !ticker.is_cancelled() {
            match self.sweep().await {
                Ok(report) => log::info!(
                    "Sweep done: {} pages, {} items, {} new, {} changed, {} stale, {} enqueued, {} failed",
                    report.pages,
                    report.seen,
                    report.inserted,
                    report.changed,
                    report.refreshed,
                    report.enqueued,
                    report.failed
                ),
                Err(e) => log::error!("Sweep aborted: {}", e),
            }

            if !ticker.wait().await {
                break;
            }
        }

        log::info!("Discoverer stopped");
    }

    /// Walk all listing pages once.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let page_size = self.config.page_size;
        let mut report = SweepReport::default();

        let first = self.api.listing_page(1, page_size).await?;
        let pages = page_count(first.total, page_size).max(1);
        log::info!("Listing reports {} items over {} pages", first.total, pages);

        self.sweep_page(&first, &mut report).await;

        let mut rest = stream::iter(2..=pages)
            .map(|page| self.api.listing_page(page, page_size))
            .buffer_unordered(self.config.page_concurrency.max(1));

        while let Some(page) = rest.next().await {
            self.sweep_page(&page?, &mut report).await;
        }

        Ok(report)
    }

    async fn sweep_page(&self, page: &ListingPage, report: &mut SweepReport) {
        report.pages += 1;
        let page_checksum = match self.config.checksum_scope {
            ChecksumScope::Page => Some(checksum(&page.raw)),
            ChecksumScope::Item => None,
        };

        for item in &page.items {
            report.seen += 1;
            let item_checksum = page_checksum
                .clone()
                .unwrap_or_else(|| canonical_checksum(item));

            match self.observe(item, &item_checksum, page.status).await {
                Ok((change, enqueued)) => report.record(change, enqueued),
                Err(e) => {
                    log::warn!("Failed to process listing item: {}", e);
                    report.failed += 1;
                }
            }
        }
    }

    /// Classify one item, write its summary and enqueue it if needed.
    ///
    /// Returns the classification and whether a job was pushed.
    async fn observe(&self, item: &Value, checksum: &str, status: u16) -> Result<(Change, bool)> {
        let id = item_id(item).ok_or_else(|| AppError::api("listing item", "missing id"))?;
        let now = Utc::now();

        let stored = self.records.find::<Summary>(&id).await?;
        let change = self.detector.classify(stored.as_ref(), checksum, now);

        let Some(stored) = stored else {
            return self.insert_new(&id, item, checksum, status, now).await;
        };

        let update = self
            .detector
            .update_for(change, &stored, item, checksum, status, now);
        self.update_summary(&id, &update).await?;

        if change.needs_fetch() {
            self.enqueue(&id).await?;
            return Ok((change, true));
        }
        Ok((change, false))
    }

    async fn insert_new(
        &self,
        id: &str,
        item: &Value,
        checksum: &str,
        status: u16,
        now: DateTime<Utc>,
    ) -> Result<(Change, bool)> {
        let summary = Summary::new(id, checksum, item.clone(), status, now);
        match self.records.insert(&summary).await? {
            InsertOutcome::Inserted => {
                log::debug!("New item {}", id);
                self.enqueue(id).await?;
                Ok((Change::New, true))
            }
            InsertOutcome::AlreadyExists => {
                log::debug!("Item {} was inserted concurrently", id);
                Ok((Change::New, false))
            }
        }
    }

    async fn update_summary(&self, id: &str, update: &SummaryUpdate) -> Result<()> {
        let records = &self.records;
        let found = retry(self.retry, AppError::is_write_conflict, move || async move {
            records.update::<Summary>(id, update).await
        })
        .await?;

        if !found {
            log::warn!("Summary {} disappeared before update", id);
        }
        Ok(())
    }

    async fn enqueue(&self, id: &str) -> Result<()> {
        self.queue.push(FETCHER_QUEUE, &Job::new(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryQueue;
    use crate::services::DetailPayload;
    use crate::storage::testing::LostRaceStore;
    use crate::storage::{DocumentStore, MemoryStore};
    use async_trait::async_trait;
    use chrono::Duration;
    use serde_json::json;
    use std::sync::Mutex;

    /// Serves fixed listing pages; page numbers are 1-based.
    struct StubListing {
        total: u64,
        pages: Mutex<Vec<Vec<Value>>>,
        failing_page: Option<usize>,
    }

    impl StubListing {
        fn new(total: u64, pages: Vec<Vec<Value>>) -> Self {
            Self {
                total,
                pages: Mutex::new(pages),
                failing_page: None,
            }
        }

        fn set_page(&self, page: usize, items: Vec<Value>) {
            self.pages.lock().unwrap()[page - 1] = items;
        }
    }

    #[async_trait]
    impl MarketplaceApi for StubListing {
        async fn listing_page(&self, page: usize, _page_size: usize) -> Result<ListingPage> {
            if self.failing_page == Some(page) {
                return Err(AppError::api(format!("listing page {page}"), "HTTP 502"));
            }
            let items = self.pages.lock().unwrap()[page - 1].clone();
            let raw = json!({"total": self.total, "items": items}).to_string();
            ListingPage::parse(200, raw)
        }

        async fn detail(&self, id: &str) -> Result<DetailPayload> {
            Err(AppError::api(format!("detail {id}"), "not served"))
        }
    }

    struct Fixture {
        api: Arc<StubListing>,
        records: Records,
        queue: Arc<MemoryQueue>,
        discoverer: Discoverer,
    }

    fn fixture(api: StubListing, config: DiscoverConfig) -> Fixture {
        let api = Arc::new(api);
        let records = Records::new(Arc::new(MemoryStore::new()));
        let queue = Arc::new(MemoryQueue::new());
        let discoverer = Discoverer::new(
            api.clone(),
            records.clone(),
            queue.clone(),
            config,
            RetryPolicy::new(2, std::time::Duration::from_millis(1)),
        );
        Fixture {
            api,
            records,
            queue,
            discoverer,
        }
    }

    fn config(page_size: usize) -> DiscoverConfig {
        DiscoverConfig {
            page_size,
            ..DiscoverConfig::default()
        }
    }

    fn item(id: u64, title: &str) -> Value {
        json!({"id": id, "title": title})
    }

    async fn drain(queue: &MemoryQueue) -> Vec<String> {
        let mut ids = Vec::new();
        while let Some(job) = queue
            .pop_timeout(FETCHER_QUEUE, std::time::Duration::from_millis(1))
            .await
            .unwrap()
        {
            ids.push(job.id);
        }
        ids
    }

    /// Push the stored fetch time back so the next sweep sees a stale item.
    async fn age(records: &Records, id: &str, by: Duration) {
        let summary: Summary = records.find(id).await.unwrap().unwrap();
        let update = SummaryUpdate {
            last_fetched_at: Some(summary.last_fetched_at - by),
            last_status: summary.last_status,
            ..SummaryUpdate::default()
        };
        records.update::<Summary>(id, &update).await.unwrap();
    }

    #[tokio::test]
    async fn test_first_sweep_inserts_and_enqueues() {
        let f = fixture(
            StubListing::new(3, vec![vec![item(1, "a"), item(2, "b")], vec![item(3, "c")]]),
            config(2),
        );

        let report = f.discoverer.sweep().await.unwrap();
        assert_eq!(report.pages, 2);
        assert_eq!(report.seen, 3);
        assert_eq!(report.inserted, 3);
        assert_eq!(report.enqueued, 3);

        let summary: Summary = f.records.find("3").await.unwrap().unwrap();
        assert_eq!(summary.checksum, canonical_checksum(&item(3, "c")));
        assert_eq!(summary.last_fetched_at, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(summary.last_status, 200);

        let mut ids = drain(&f.queue).await;
        ids.sort();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_repeat_sweep_is_idempotent() {
        let f = fixture(StubListing::new(1, vec![vec![item(1, "a")]]), config(100));
        f.discoverer.sweep().await.unwrap();
        drain(&f.queue).await;

        // New items start stale; the second sweep claims them once.
        let second = f.discoverer.sweep().await.unwrap();
        assert_eq!(second.refreshed, 1);
        assert_eq!(drain(&f.queue).await, vec!["1"]);

        let third = f.discoverer.sweep().await.unwrap();
        assert_eq!(third.unchanged, 1);
        assert_eq!(third.enqueued, 0);
        assert!(drain(&f.queue).await.is_empty());
        assert_eq!(f.records.store().count("summaries").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_changed_item_enqueued_once() {
        let f = fixture(StubListing::new(1, vec![vec![item(1, "a")]]), config(100));
        f.discoverer.sweep().await.unwrap();
        f.discoverer.sweep().await.unwrap();
        drain(&f.queue).await;

        // Changed and stale at the same time still yields a single job.
        age(&f.records, "1", Duration::hours(1)).await;
        f.api.set_page(1, vec![item(1, "b")]);

        let report = f.discoverer.sweep().await.unwrap();
        assert_eq!(report.changed, 1);
        assert_eq!(report.enqueued, 1);
        assert_eq!(drain(&f.queue).await, vec!["1"]);

        let summary: Summary = f.records.find("1").await.unwrap().unwrap();
        assert_eq!(summary.content, item(1, "b"));
        assert_eq!(summary.checksum, canonical_checksum(&item(1, "b")));
    }

    #[tokio::test]
    async fn test_stale_item_refreshed() {
        let f = fixture(StubListing::new(1, vec![vec![item(1, "a")]]), config(100));
        f.discoverer.sweep().await.unwrap();
        f.discoverer.sweep().await.unwrap();
        drain(&f.queue).await;

        age(&f.records, "1", Duration::seconds(51)).await;
        let before = Utc::now();
        let report = f.discoverer.sweep().await.unwrap();

        assert_eq!(report.refreshed, 1);
        assert_eq!(drain(&f.queue).await, vec!["1"]);
        let summary: Summary = f.records.find("1").await.unwrap().unwrap();
        assert!(summary.last_fetched_at >= before);
    }

    #[tokio::test]
    async fn test_item_without_id_counted_as_failed() {
        let f = fixture(
            StubListing::new(2, vec![vec![json!({"title": "no id"}), item(2, "b")]]),
            config(100),
        );

        let report = f.discoverer.sweep().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.inserted, 1);
    }

    #[tokio::test]
    async fn test_failed_page_aborts_sweep() {
        let mut api = StubListing::new(4, vec![vec![item(1, "a")], vec![item(2, "b")]]);
        api.failing_page = Some(2);
        let f = fixture(api, config(2));

        assert!(f.discoverer.sweep().await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_pages_cover_listing() {
        let pages: Vec<Vec<Value>> = (0..5).map(|p| vec![item(p * 10 + 1, "x")]).collect();
        let config = DiscoverConfig {
            page_size: 1,
            page_concurrency: 3,
            ..DiscoverConfig::default()
        };
        let f = fixture(StubListing::new(5, pages), config);

        let report = f.discoverer.sweep().await.unwrap();
        assert_eq!(report.pages, 5);
        assert_eq!(report.inserted, 5);
        assert_eq!(f.queue.len(FETCHER_QUEUE).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_page_scope_checksum() {
        let config = DiscoverConfig {
            checksum_scope: ChecksumScope::Page,
            ..DiscoverConfig::default()
        };
        let f = fixture(
            StubListing::new(2, vec![vec![item(1, "a"), item(2, "b")]]),
            config,
        );
        f.discoverer.sweep().await.unwrap();
        f.discoverer.sweep().await.unwrap();
        drain(&f.queue).await;

        // Touching one item changes the hash of every item on its page.
        f.api.set_page(1, vec![item(1, "a"), item(2, "B")]);
        let report = f.discoverer.sweep().await.unwrap();
        assert_eq!(report.changed, 2);

        let one: Summary = f.records.find("1").await.unwrap().unwrap();
        let two: Summary = f.records.find("2").await.unwrap().unwrap();
        assert_eq!(one.checksum, two.checksum);
    }

    #[tokio::test]
    async fn test_lost_insert_race_enqueues_nothing() {
        let store = Arc::new(LostRaceStore::new("summaries"));
        let winner = json!({"id": "1", "checksum": "w", "last_status": 200});
        store.inner.insert("summaries", "1", winner.clone()).await.unwrap();

        let queue = Arc::new(MemoryQueue::new());
        let discoverer = Discoverer::new(
            Arc::new(StubListing::new(1, vec![vec![item(1, "a")]])),
            Records::new(store.clone()),
            queue.clone(),
            config(100),
            RetryPolicy::new(2, std::time::Duration::from_millis(1)),
        );

        let report = discoverer.sweep().await.unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.enqueued, 0);
        assert_eq!(report.failed, 0);
        assert_eq!(queue.len(FETCHER_QUEUE).await.unwrap(), 0);
        assert_eq!(store.inner.find("summaries", "1").await.unwrap(), Some(winner));
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let f = fixture(StubListing::new(1, vec![vec![item(1, "a")]]), config(100));
        let cancel = CancellationToken::new();
        cancel.cancel();

        f.discoverer.run(cancel).await;
        assert_eq!(f.queue.len(FETCHER_QUEUE).await.unwrap(), 0);
    }
}
