//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Marketplace partner API
    #[serde(default)]
    pub api: ApiConfig,

    /// HTTP client behavior
    #[serde(default)]
    pub http: HttpConfig,

    /// Listing sweep settings
    #[serde(default)]
    pub discover: DiscoverConfig,

    /// Detail fetcher settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Exchange rate source
    #[serde(default)]
    pub rates: RatesConfig,

    /// Currency normalization
    #[serde(default)]
    pub currency: CurrencyConfig,

    /// Document store backend
    #[serde(default)]
    pub store: StoreConfig,

    /// Work queue backend
    #[serde(default)]
    pub queue: QueueConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.api.api_key.trim().is_empty() {
            return Err(AppError::validation("api.api_key is empty"));
        }
        url::Url::parse(&self.api.base_url)?;
        url::Url::parse(&self.rates.url)?;
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.discover.page_size == 0 {
            return Err(AppError::validation("discover.page_size must be > 0"));
        }
        if self.discover.page_concurrency == 0 {
            return Err(AppError::validation(
                "discover.page_concurrency must be > 0",
            ));
        }
        if self.fetch.max_concurrent == 0 {
            return Err(AppError::validation("fetch.max_concurrent must be > 0"));
        }
        if self.fetch.batch_size == 0 {
            return Err(AppError::validation("fetch.batch_size must be > 0"));
        }
        if self.store.retry_attempts == 0 {
            return Err(AppError::validation("store.retry_attempts must be > 0"));
        }
        if self.currency.foreign_unit.trim().is_empty() || self.currency.local_unit.trim().is_empty()
        {
            return Err(AppError::validation("currency units must not be empty"));
        }
        Ok(())
    }
}

/// Partner API endpoints and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Scheme and host of the partner API
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Path of the listing endpoint; details live under `{listing_path}/{id}`
    #[serde(default = "defaults::listing_path")]
    pub listing_path: String,

    /// Listing state filter
    #[serde(default = "defaults::states")]
    pub states: String,

    /// Key sent as the basic-auth user name
    #[serde(default)]
    pub api_key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            listing_path: defaults::listing_path(),
            states: defaults::states(),
            api_key: String::new(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// How listing checksums are computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumScope {
    /// Hash each item's own canonical JSON
    #[default]
    Item,
    /// Hash the whole page body; any change on a page touches every item on it
    Page,
}

/// Listing sweep settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverConfig {
    /// Delay between sweeps, also the staleness threshold
    #[serde(default = "defaults::sweep_interval")]
    pub interval_secs: u64,

    /// Items requested per listing page
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,

    /// Listing pages requested at once
    #[serde(default = "defaults::page_concurrency")]
    pub page_concurrency: usize,

    #[serde(default)]
    pub checksum_scope: ChecksumScope,
}

impl DiscoverConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Age after which an unchanged summary is pushed through the fetcher again.
    pub fn refresh_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.interval_secs as i64)
    }
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::sweep_interval(),
            page_size: defaults::page_size(),
            page_concurrency: defaults::page_concurrency(),
            checksum_scope: ChecksumScope::default(),
        }
    }
}

/// Detail fetcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum detail requests in flight
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Jobs launched before the fetcher drains and pauses
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,

    /// How long an empty queue is waited on before a batch closes
    #[serde(default = "defaults::idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Pause between batches
    #[serde(default = "defaults::pause")]
    pub pause_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::max_concurrent(),
            batch_size: defaults::batch_size(),
            idle_timeout_secs: defaults::idle_timeout(),
            pause_secs: defaults::pause(),
        }
    }
}

/// Exchange rate source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatesConfig {
    /// Rate sheet export endpoint, queried with `?date=dd.mm.yyyy`
    #[serde(default = "defaults::rates_url")]
    pub url: String,

    /// Text identifying the target currency row
    #[serde(default = "defaults::currency_name")]
    pub currency_name: String,

    /// Header of the column holding currency labels
    #[serde(default = "defaults::label_column")]
    pub label_column: String,

    /// Previous days tried when the source has a gap
    #[serde(default = "defaults::max_lookback_days")]
    pub max_lookback_days: u32,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            url: defaults::rates_url(),
            currency_name: defaults::currency_name(),
            label_column: defaults::label_column(),
            max_lookback_days: defaults::max_lookback_days(),
        }
    }
}

/// Currency normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyConfig {
    /// Price unit converted on ingest
    #[serde(default = "defaults::foreign_unit")]
    pub foreign_unit: String,

    /// Price unit written after conversion
    #[serde(default = "defaults::local_unit")]
    pub local_unit: String,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            foreign_unit: defaults::foreign_unit(),
            local_unit: defaults::local_unit(),
        }
    }
}

/// Document store backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// JSON collections on the local filesystem
    #[default]
    Local,
    /// Process-local, lost on exit
    Memory,
}

/// Document store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Root directory for the local backend
    #[serde(default = "defaults::store_dir")]
    pub dir: PathBuf,

    /// Attempts for updates hitting write conflicts
    #[serde(default = "defaults::retry_attempts")]
    pub retry_attempts: u32,

    /// Delay between those attempts in milliseconds
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            dir: defaults::store_dir(),
            retry_attempts: defaults::retry_attempts(),
            retry_delay_ms: defaults::retry_delay(),
        }
    }
}

/// Work queue backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    /// Redis list, shared between processes
    #[default]
    Redis,
    /// Process-local, only useful when both loops share a process
    Memory,
}

/// Work queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub backend: QueueBackend,

    #[serde(default = "defaults::redis_url")]
    pub redis_url: String,

    /// Prefix prepended to queue names
    #[serde(default = "defaults::namespace")]
    pub namespace: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::default(),
            redis_url: defaults::redis_url(),
            namespace: defaults::namespace(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // API defaults
    pub fn base_url() -> String {
        "https://partners-api.999.md".into()
    }
    pub fn listing_path() -> String {
        "/adverts".into()
    }
    pub fn states() -> String {
        "public,hidden,blocked,blocked_commercial,expired".into()
    }

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; feedpipe/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Discover defaults
    pub fn sweep_interval() -> u64 {
        50
    }
    pub fn page_size() -> usize {
        100
    }
    pub fn page_concurrency() -> usize {
        1
    }

    // Fetch defaults
    pub fn max_concurrent() -> usize {
        100
    }
    pub fn batch_size() -> usize {
        1000
    }
    pub fn idle_timeout() -> u64 {
        5
    }
    pub fn pause() -> u64 {
        1
    }

    // Rate defaults
    pub fn rates_url() -> String {
        "https://www.bnm.md/en/export-official-exchange-rates".into()
    }
    pub fn currency_name() -> String {
        "Euro".into()
    }
    pub fn label_column() -> String {
        "Official exchange rate:".into()
    }
    pub fn max_lookback_days() -> u32 {
        10
    }

    // Currency defaults
    pub fn foreign_unit() -> String {
        "eur".into()
    }
    pub fn local_unit() -> String {
        "mdl".into()
    }

    // Store defaults
    pub fn store_dir() -> PathBuf {
        PathBuf::from("storage")
    }
    pub fn retry_attempts() -> u32 {
        10
    }
    pub fn retry_delay() -> u64 {
        3000
    }

    // Queue defaults
    pub fn redis_url() -> String {
        "redis://127.0.0.1:6379".into()
    }
    pub fn namespace() -> String {
        "feedpipe:".into()
    }
}
