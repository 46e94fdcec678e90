//! App-only access tokens for Graph calls
//!
//! Client-credentials grant against the tenant token endpoint. The
//! token is cached until shortly before it expires; concurrent callers
//! share one in-flight refresh because the cache lock is held across
//! the check and the fetch.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use oriel_core::config::GRAPH_OAUTH_SCOPE;
use oriel_core::{EntraConfig, HttpClient, OrielError, Result};

/// Refresh this many seconds before the provider-reported expiry.
const EXPIRATION_BUFFER_SECS: i64 = 30;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn fresh(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

pub struct AccessTokenProvider {
    config: EntraConfig,
    http: HttpClient,
    cached: Mutex<Option<CachedToken>>,
}

impl AccessTokenProvider {
    pub fn new(config: EntraConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            http: HttpClient::new()?,
            cached: Mutex::new(None),
        })
    }

    /// Returns a bearer token for Graph, reusing the cached one while it
    /// has more than [`EXPIRATION_BUFFER_SECS`] of life left.
    #[instrument(skip(self))]
    pub async fn get(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.fresh() {
                return Ok(token.value.clone());
            }
        }

        let token = self.fetch().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn fetch(&self) -> Result<CachedToken> {
        debug!("requesting app-only Graph token");
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "client_credentials"),
            ("scope", GRAPH_OAUTH_SCOPE),
        ];

        let response = self
            .http
            .post_form(&self.config.token_endpoint_url(), &params)
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            return Err(OrielError::network(format!(
                "client credentials grant refused: HTTP {status}: {excerpt}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| OrielError::network(format!("malformed token response: {e}")))?;

        Ok(CachedToken {
            value: token.access_token,
            expires_at: Utc::now()
                + Duration::seconds(token.expires_in - EXPIRATION_BUFFER_SECS),
        })
    }
}
