//! PKCE authorization-code flow
//!
//! [`AuthorizationRequest`] carries the three per-login secrets and is
//! the only state the flow keeps; it lives in the caller's session
//! between redirect and callback. [`Authorization`] builds the authorize
//! URL and runs the callback side: state check, code exchange, ID-token
//! verification and nonce check.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use oriel_core::config::{OAUTH_CHALLENGE_METHOD, OAUTH_SCOPE};
use oriel_core::http::read_json;
use oriel_core::{EntraConfig, HttpClient, Identity, Nametag, OrielError, Result};

use crate::jwks::KeySetCache;

const CODE_VERIFIER_BYTES: usize = 64;
const STATE_BYTES: usize = 16;
const NONCE_BYTES: usize = 16;

/// Per-login secrets generated at the start of the flow.
///
/// Callers persist all three values in session-equivalent storage and
/// restore them on the callback; nothing is kept server-side.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub redirect_uri: String,
    pub code_verifier: String,
    pub state: String,
    pub nonce: String,
}

impl AuthorizationRequest {
    pub fn new(redirect_uri: impl Into<String>) -> Self {
        let mut verifier = [0u8; CODE_VERIFIER_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut verifier);

        let mut state = [0u8; STATE_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut state);

        let mut nonce = [0u8; NONCE_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        Self {
            redirect_uri: redirect_uri.into(),
            code_verifier: URL_SAFE_NO_PAD.encode(verifier),
            state: hex::encode(state),
            nonce: hex::encode(nonce),
        }
    }

    /// Rebuilds a request from session-stored values on the callback.
    pub fn restore(
        redirect_uri: impl Into<String>,
        code_verifier: impl Into<String>,
        state: impl Into<String>,
        nonce: impl Into<String>,
    ) -> Self {
        Self {
            redirect_uri: redirect_uri.into(),
            code_verifier: code_verifier.into(),
            state: state.into(),
            nonce: nonce.into(),
        }
    }

    /// `base64url(SHA256(code_verifier))`, unpadded, per RFC 7636.
    pub fn code_challenge(&self) -> String {
        let digest = Sha256::digest(self.code_verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    expires_in: Option<i64>,
}

/// Decoded ID-token payload. Validated, consumed, discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdTokenClaims {
    iss: String,
    aud: String,
    exp: i64,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    oid: Option<String>,
    sub: String,
    #[serde(default)]
    preferred_username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    given_name: Option<String>,
    #[serde(default)]
    family_name: Option<String>,
    #[serde(default)]
    nonce: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ProfileResponse {
    #[serde(rename = "givenName")]
    given_name: Option<String>,
    surname: Option<String>,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

/// Runs the provider side of the authorization-code flow.
pub struct Authorization {
    config: EntraConfig,
    http: HttpClient,
    key_sets: Arc<KeySetCache>,
}

impl Authorization {
    pub fn new(config: EntraConfig, key_sets: Arc<KeySetCache>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            http: HttpClient::new()?,
            key_sets,
        })
    }

    /// The provider authorize URL for `request`, with the exact parameter
    /// set Entra expects.
    pub fn authorize_url(&self, request: &AuthorizationRequest) -> String {
        format!(
            "{}?client_id={}&response_type=code&redirect_uri={}&response_mode=query\
             &scope={}&state={}&nonce={}&code_challenge={}&code_challenge_method={}\
             &prompt=select_account",
            self.config.authorize_url(),
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&request.redirect_uri),
            urlencoding::encode(OAUTH_SCOPE),
            urlencoding::encode(&request.state),
            urlencoding::encode(&request.nonce),
            urlencoding::encode(&request.code_challenge()),
            OAUTH_CHALLENGE_METHOD,
        )
    }

    /// Callback side of the flow: validates state, exchanges the code,
    /// verifies the ID token and the nonce, and maps the claims to an
    /// [`Identity`].
    #[instrument(skip_all, fields(redirect_uri = %request.redirect_uri))]
    pub async fn exchange_code(
        &self,
        code: &str,
        returned_state: &str,
        request: &AuthorizationRequest,
    ) -> Result<Identity> {
        if returned_state.is_empty() || request.state.is_empty() {
            return Err(OrielError::InvalidCredentials);
        }
        if !constant_time_eq(returned_state.as_bytes(), request.state.as_bytes()) {
            return Err(OrielError::InvalidState);
        }

        let tokens = self.fetch_tokens(code, request).await?;
        let id_token = tokens
            .id_token
            .as_deref()
            .ok_or_else(|| OrielError::oauth("token response carried no id_token"))?;

        let claims = self.decode_id_token(id_token).await?;

        let nonce = claims.nonce.as_deref().unwrap_or_default();
        if !constant_time_eq(nonce.as_bytes(), request.nonce.as_bytes()) {
            warn!("nonce mismatch in verified ID token");
            return Err(OrielError::InvalidNonce);
        }

        self.build_identity(claims, &tokens.access_token).await
    }

    async fn fetch_tokens(
        &self,
        code: &str,
        request: &AuthorizationRequest,
    ) -> Result<TokenResponse> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", request.redirect_uri.as_str()),
            ("code_verifier", request.code_verifier.as_str()),
        ];

        let response = self
            .http
            .post_form(&self.config.token_endpoint_url(), &params)
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            return Err(OrielError::oauth(format!(
                "token endpoint rejected the exchange: HTTP {status}: {excerpt}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| OrielError::oauth(format!("malformed token response: {e}")))
    }

    /// Verifies signature (RS256 against the cached JWKS, with one forced
    /// refresh on an unknown kid), audience, issuer and time claims.
    async fn decode_id_token(&self, id_token: &str) -> Result<IdTokenClaims> {
        let header = decode_header(id_token)
            .map_err(|e| OrielError::jwt_verification(format!("unreadable JWT header: {e}")))?;
        let kid = header
            .kid
            .ok_or_else(|| OrielError::jwt_verification("JWT header missing 'kid'"))?;

        let mut keys = self.key_sets.get(false).await?;
        if keys.find(&kid).is_none() {
            debug!(%kid, "kid not in cached key set, forcing refresh");
            keys = self.key_sets.get(true).await?;
        }
        let decoding_key = keys.decoding_key(&kid)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.config.client_id]);
        validation.set_issuer(&[self.config.issuer_url()]);
        validation.leeway = 60;

        let data = decode::<IdTokenClaims>(id_token, &decoding_key, &validation)
            .map_err(|e| OrielError::jwt_verification(format!("ID token rejected: {e}")))?;

        Ok(data.claims)
    }

    async fn build_identity(
        &self,
        claims: IdTokenClaims,
        access_token: &str,
    ) -> Result<Identity> {
        let external_id = claims
            .oid
            .clone()
            .unwrap_or_else(|| claims.sub.clone());
        let preferred_username = claims
            .preferred_username
            .clone()
            .or_else(|| claims.email.clone())
            .unwrap_or_else(|| claims.sub.clone());

        // Claims often omit given/family name; one profile lookup fills
        // the gap. Failures degrade to the display-name fallback.
        let profile = if claims.given_name.is_none() && claims.family_name.is_none() {
            self.fetch_profile(access_token).await.unwrap_or_default()
        } else {
            ProfileResponse::default()
        };

        let nametag = Nametag::new(
            claims.given_name.clone().or(profile.given_name),
            claims.family_name.clone().or(profile.surname),
            claims.name.clone().or(profile.display_name),
        );

        let raw_claims = serde_json::to_value(&claims)
            .map_err(|e| OrielError::internal(format!("claims not serializable: {e}")))?;

        Ok(Identity {
            external_id,
            preferred_username,
            first_name: nametag.first_name(),
            last_name: nametag.last_name(),
            raw_claims,
        })
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProfileResponse> {
        let url = self.config.graph_url("/me");
        let response = self.http.get_bearer(&url, access_token).await?;
        read_json(response).await
    }
}

/// Constant-time comparison to prevent timing attacks on state/nonce.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
