// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};

use crate::error::{AppError, Result};
use crate::models::HttpConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &HttpConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Send a request and read the body as text, keeping the status code.
///
/// Non-success statuses are reported as API errors tagged with `context`.
pub async fn send_text(request: RequestBuilder, context: &str) -> Result<(u16, String)> {
    let response: Response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(AppError::api(context, format!("HTTP {status}")));
    }
    Ok((status.as_u16(), body))
}
