//! Provider signing-key cache
//!
//! Fetches the tenant's JWKS and caches it for as long as the response's
//! `Cache-Control: max-age` allows (one hour when absent or malformed).
//! A fetch failure never clobbers a previously cached entry; the error is
//! surfaced for that request only.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use oriel_core::http::read_json;
use oriel_core::{EntraConfig, HttpClient, OrielError, Result};

pub const DEFAULT_MAX_AGE_SECS: u64 = 3600;

/// JSON Web Key, RSA parameters only - Entra signs ID tokens with RS256.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }

    /// Builds an RS256 decoding key for `kid`. A missing kid is the
    /// caller's cue to force one cache refresh and retry.
    pub fn decoding_key(&self, kid: &str) -> Result<DecodingKey> {
        let jwk = self.find(kid).ok_or_else(|| {
            OrielError::jwt_verification(format!("key '{kid}' not found in key set"))
        })?;

        if jwk.kty != "RSA" {
            return Err(OrielError::jwt_verification(format!(
                "unsupported key type: {}",
                jwk.kty
            )));
        }

        let n = jwk
            .n
            .as_deref()
            .ok_or_else(|| OrielError::jwt_verification("RSA key missing 'n' parameter"))?;
        let e = jwk
            .e
            .as_deref()
            .ok_or_else(|| OrielError::jwt_verification("RSA key missing 'e' parameter"))?;

        DecodingKey::from_rsa_components(n, e)
            .map_err(|err| OrielError::jwt_verification(format!("invalid RSA key: {err}")))
    }
}

#[derive(Debug, Clone)]
struct CachedKeys {
    keys: JwkSet,
    expires_at: DateTime<Utc>,
}

/// Process-wide cache of the tenant's signing keys.
#[derive(Debug)]
pub struct KeySetCache {
    http: HttpClient,
    jwks_url: String,
    entry: RwLock<Option<CachedKeys>>,
}

impl KeySetCache {
    pub fn new(config: &EntraConfig) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new()?,
            jwks_url: config.jwks_url(),
            entry: RwLock::new(None),
        })
    }

    /// Returns the cached key set, fetching when forced, absent or stale.
    /// A read before expiry never touches the network. The write lock is
    /// held across the fetch, so concurrent expiries collapse to a single
    /// network call.
    pub async fn get(&self, force_refresh: bool) -> Result<JwkSet> {
        if !force_refresh {
            let entry = self.entry.read().await;
            if let Some(cached) = entry.as_ref() {
                if Utc::now() <= cached.expires_at {
                    return Ok(cached.keys.clone());
                }
            }
        }

        let mut entry = self.entry.write().await;
        if !force_refresh {
            // Another caller may have refreshed while we waited.
            if let Some(cached) = entry.as_ref() {
                if Utc::now() <= cached.expires_at {
                    return Ok(cached.keys.clone());
                }
            }
        }

        let cached = self.fetch().await?;
        let keys = cached.keys.clone();
        *entry = Some(cached);
        Ok(keys)
    }

    async fn fetch(&self) -> Result<CachedKeys> {
        debug!(url = %self.jwks_url, "fetching JWKS");
        let response = self.http.get(&self.jwks_url).await?;

        let max_age = response
            .headers()
            .get("cache-control")
            .and_then(|v| v.to_str().ok())
            .map(parse_max_age)
            .unwrap_or(DEFAULT_MAX_AGE_SECS);

        let keys: JwkSet = read_json(response).await?;
        Ok(CachedKeys {
            keys,
            expires_at: Utc::now() + Duration::seconds(max_age as i64),
        })
    }
}

/// Pulls `max-age=N` out of a Cache-Control header, defaulting to one
/// hour when the directive is missing or unreadable.
pub fn parse_max_age(header: &str) -> u64 {
    for directive in header.split(',') {
        let directive = directive.trim();
        if let Some(value) = directive.strip_prefix("max-age=") {
            match value.parse() {
                Ok(secs) => return secs,
                Err(_) => {
                    warn!(header, "unreadable max-age directive");
                    return DEFAULT_MAX_AGE_SECS;
                }
            }
        }
    }

    DEFAULT_MAX_AGE_SECS
}
