//! Minimal HTTP wrapper used for every outbound call
//!
//! TLS verification stays on, timeouts are bounded, and every transport
//! failure (timeout, TLS, connection reset, non-2xx, malformed JSON)
//! surfaces as `OrielError::Network` so callers can apply one retry
//! policy across the board.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{OrielError, Result};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);
/// Bulk directory pages can be large; give them more room.
pub const BULK_READ_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        Self::with_read_timeout(DEFAULT_READ_TIMEOUT)
    }

    pub fn with_read_timeout(read_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(read_timeout)
            .build()
            .map_err(|e| OrielError::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    pub async fn get(&self, url: &str) -> Result<Response> {
        debug!(url, "GET");
        self.client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(transport_error)
    }

    pub async fn get_bearer(&self, url: &str, token: &str) -> Result<Response> {
        debug!(url, "GET (bearer)");
        self.client
            .get(url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(transport_error)
    }

    pub async fn post_form(&self, url: &str, params: &[(&str, &str)]) -> Result<Response> {
        debug!(url, "POST (form)");
        self.client
            .post(url)
            .form(params)
            .send()
            .await
            .map_err(transport_error)
    }
}

/// Rejects non-2xx responses, keeping the status and a body excerpt.
pub async fn expect_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let excerpt: String = body.chars().take(200).collect();
    Err(OrielError::network(format!("HTTP {status}: {excerpt}")))
}

/// Reads a 2xx JSON body, normalizing parse failures to `Network`.
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = expect_success(response).await?;
    response
        .json()
        .await
        .map_err(|e| OrielError::network(format!("malformed JSON response: {e}")))
}

fn transport_error(e: reqwest::Error) -> OrielError {
    if e.is_timeout() {
        OrielError::network(format!("request timeout: {e}"))
    } else if e.is_connect() {
        OrielError::network(format!("connection failed: {e}"))
    } else {
        OrielError::network(format!("network error: {e}"))
    }
}
