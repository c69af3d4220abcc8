// src/services/api.rs

//! Partner API client.
//!
//! The listing endpoint is paginated (`page`, `page_size`, `states`) and
//! answers `{"total": n, "items": [...]}`; older deployments call the array
//! `adverts`. Details are served from `{listing}/{id}`. Both use basic auth
//! with the API key as user name.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::ApiConfig;
use crate::utils::http::send_text;

/// One page of the listing endpoint.
#[derive(Debug, Clone)]
pub struct ListingPage {
    /// HTTP status of the response
    pub status: u16,
    /// Items reported across all pages
    pub total: u64,
    pub items: Vec<Value>,
    /// Response body as received
    pub raw: String,
}

#[derive(Deserialize)]
struct ListingBody {
    total: u64,
    #[serde(default, alias = "adverts")]
    items: Vec<Value>,
}

impl ListingPage {
    /// Parse a listing response body.
    pub fn parse(status: u16, raw: String) -> Result<Self> {
        let body: ListingBody = serde_json::from_str(&raw)?;
        Ok(Self {
            status,
            total: body.total,
            items: body.items,
            raw,
        })
    }
}

/// Detail payload of one item.
#[derive(Debug, Clone)]
pub struct DetailPayload {
    pub status: u16,
    pub content: Value,
}

/// Number of pages needed to cover `total` items.
pub fn page_count(total: u64, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    (total as usize).div_ceil(page_size)
}

/// Item id as a string; the API sends numbers or strings.
pub fn item_id(item: &Value) -> Option<String> {
    match item.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Trait for partner API access.
#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    /// Fetch one listing page (1-based).
    async fn listing_page(&self, page: usize, page_size: usize) -> Result<ListingPage>;

    /// Fetch the detail payload of one item.
    async fn detail(&self, id: &str) -> Result<DetailPayload>;
}

/// Partner API over HTTP.
pub struct HttpMarketplaceApi {
    client: Client,
    listing_url: Url,
    states: String,
    api_key: String,
}

impl HttpMarketplaceApi {
    pub fn new(client: Client, config: &ApiConfig) -> Result<Self> {
        let listing_url = Url::parse(&config.base_url)?.join(&config.listing_path)?;
        Ok(Self {
            client,
            listing_url,
            states: config.states.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn detail_url(&self, id: &str) -> Result<Url> {
        let mut url = self.listing_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::config("listing URL cannot carry a path"))?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }
}

#[async_trait]
impl MarketplaceApi for HttpMarketplaceApi {
    async fn listing_page(&self, page: usize, page_size: usize) -> Result<ListingPage> {
        log::info!("Requesting page {}", page);
        let request = self
            .client
            .get(self.listing_url.clone())
            .basic_auth(&self.api_key, None::<&str>)
            .query(&[
                ("page", page.to_string()),
                ("page_size", page_size.to_string()),
                ("states", self.states.clone()),
            ]);
        let (status, raw) = send_text(request, &format!("listing page {page}")).await?;
        ListingPage::parse(status, raw)
    }

    async fn detail(&self, id: &str) -> Result<DetailPayload> {
        let request = self
            .client
            .get(self.detail_url(id)?)
            .basic_auth(&self.api_key, None::<&str>);
        let (status, raw) = send_text(request, &format!("detail {id}")).await?;
        Ok(DetailPayload {
            status,
            content: serde_json::from_str(&raw)?,
        })
    }
}
