// src/pipeline/runner.rs

//! Construction of shared handles and the long-running loops.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{
    Config, Detail, Document, QueueBackend, QueueConfig, RateRecord, StoreBackend, StoreConfig,
    Summary,
};
use crate::pipeline::discover::Discoverer;
use crate::pipeline::fetch::Fetcher;
use crate::queue::{FETCHER_QUEUE, MemoryQueue, WorkQueue};
use crate::services::{
    CurrencyNormalizer, HttpMarketplaceApi, HttpRateSource, MarketplaceApi, RateResolver,
    RateSource,
};
use crate::storage::{DocumentStore, LocalStore, MemoryStore, Records};
use crate::utils::RetryPolicy;
use crate::utils::http::create_async_client;

/// Handles shared by every pipeline stage.
pub struct Services {
    pub config: Config,
    pub records: Records,
    pub queue: Arc<dyn WorkQueue>,
    pub api: Arc<dyn MarketplaceApi>,
    pub rate_source: Arc<dyn RateSource>,
}

/// Collection sizes and queue depth.
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub summaries: usize,
    pub details: usize,
    pub rates: usize,
    pub queued: usize,
}

impl Services {
    /// Build HTTP clients, the store and the queue from configuration.
    pub async fn from_config(config: Config) -> Result<Self> {
        let client = create_async_client(&config.http)?;
        let store = build_store(&config.store);
        let queue = build_queue(&config.queue).await?;
        let api = Arc::new(HttpMarketplaceApi::new(client.clone(), &config.api)?);
        let rate_source = Arc::new(HttpRateSource::new(client, config.rates.url.clone()));

        Ok(Self::new(config, Records::new(store), queue, api, rate_source))
    }

    pub fn new(
        config: Config,
        records: Records,
        queue: Arc<dyn WorkQueue>,
        api: Arc<dyn MarketplaceApi>,
        rate_source: Arc<dyn RateSource>,
    ) -> Self {
        Self {
            config,
            records,
            queue,
            api,
            rate_source,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::for_store(&self.config.store)
    }

    pub fn rate_resolver(&self) -> RateResolver {
        RateResolver::new(
            self.records.clone(),
            Arc::clone(&self.rate_source),
            self.config.rates.clone(),
        )
    }

    pub fn discoverer(&self) -> Discoverer {
        Discoverer::new(
            Arc::clone(&self.api),
            self.records.clone(),
            Arc::clone(&self.queue),
            self.config.discover.clone(),
            self.retry_policy(),
        )
    }

    pub fn fetcher(&self) -> Arc<Fetcher> {
        Arc::new(Fetcher::new(
            Arc::clone(&self.api),
            self.records.clone(),
            Arc::clone(&self.queue),
            self.rate_resolver(),
            CurrencyNormalizer::new(&self.config.currency),
            self.config.fetch.clone(),
            self.retry_policy(),
        ))
    }

    pub async fn stats(&self) -> Result<Stats> {
        let store = self.records.store();
        Ok(Stats {
            summaries: store.count(Summary::COLLECTION).await?,
            details: store.count(Detail::COLLECTION).await?,
            rates: store.count(RateRecord::COLLECTION).await?,
            queued: self.queue.len(FETCHER_QUEUE).await?,
        })
    }
}

/// Store backend selected by configuration.
pub fn build_store(config: &StoreConfig) -> Arc<dyn DocumentStore> {
    match config.backend {
        StoreBackend::Local => {
            log::info!("Using local store at {}", config.dir.display());
            Arc::new(LocalStore::new(&config.dir))
        }
        StoreBackend::Memory => {
            log::info!("Using in-memory store");
            Arc::new(MemoryStore::new())
        }
    }
}

/// Queue backend selected by configuration.
pub async fn build_queue(config: &QueueConfig) -> Result<Arc<dyn WorkQueue>> {
    match config.backend {
        QueueBackend::Memory => {
            log::info!("Using in-memory queue");
            Ok(Arc::new(MemoryQueue::new()))
        }
        #[cfg(feature = "redis")]
        QueueBackend::Redis => {
            log::info!("Connecting to redis queue at {}", config.redis_url);
            Ok(Arc::new(crate::queue::RedisQueue::connect(config).await?))
        }
        #[cfg(not(feature = "redis"))]
        QueueBackend::Redis => Err(AppError::config(
            "queue.backend = \"redis\" requires the `redis` feature",
        )),
    }
}

/// Run the discoverer and the fetcher side by side until cancelled.
pub async fn run_all(services: &Services, cancel: CancellationToken) {
    let discoverer = services.discoverer();
    let fetcher = services.fetcher();
    tokio::join!(discoverer.run(cancel.clone()), fetcher.run(cancel));
}

/// Resolve the rate for `date`, defaulting to today.
pub async fn resolve_rate(services: &Services, date: Option<NaiveDate>) -> Result<(NaiveDate, f64)> {
    let date = date.unwrap_or_else(|| Utc::now().date_naive());
    let rate = services.rate_resolver().resolve(date).await?;
    Ok((date, rate))
}

/// Check a collection name against the known ones.
pub fn collection(name: &str) -> Result<&'static str> {
    [Summary::COLLECTION, Detail::COLLECTION, RateRecord::COLLECTION]
        .into_iter()
        .find(|c| *c == name)
        .ok_or_else(|| AppError::validation(format!("unknown collection '{name}'")))
}
