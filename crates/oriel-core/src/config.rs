//! Entra ID configuration
//!
//! An explicit configuration struct passed into each component's
//! constructor. There is no ambient global: callers build one
//! `EntraConfig` and hand clones to the authorization flow, the Graph
//! client and the reconcilers.

use serde::Deserialize;

use crate::error::{OrielError, Result};

pub const OAUTH_AUTHORIZE_PATH: &str = "oauth2/v2.0/authorize";
pub const OAUTH_TOKEN_PATH: &str = "oauth2/v2.0/token";
pub const OAUTH_JWKS_PATH: &str = "discovery/v2.0/keys";
pub const OAUTH_SCOPE: &str = "openid profile email";
pub const OAUTH_CHALLENGE_METHOD: &str = "S256";

pub const GRAPH_OAUTH_SCOPE: &str = "https://graph.microsoft.com/.default";

fn default_login_base() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_graph_base() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

fn default_enabled() -> bool {
    true
}

/// What happens when a verified identity has no matching local account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationPolicy {
    /// Unknown identities are turned away.
    Disabled,
    /// A new active account is created on first login.
    #[default]
    Automatic,
    /// A new account is created but must be activated by an administrator.
    Pending,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntraConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// When set, Entra ID is the only allowed sign-in method.
    #[serde(default)]
    pub exclusive: bool,
    #[serde(default)]
    pub registration: RegistrationPolicy,

    /// Overridable for tests; production deployments keep the defaults.
    #[serde(default = "default_login_base")]
    pub login_base: String,
    #[serde(default = "default_graph_base")]
    pub graph_base: String,
}

impl EntraConfig {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            enabled: true,
            exclusive: false,
            registration: RegistrationPolicy::default(),
            login_base: default_login_base(),
            graph_base: default_graph_base(),
        }
    }

    /// Fails unless tenant id, client id and client secret are all present
    /// and the integration is enabled.
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Err(OrielError::config("Entra ID authentication is disabled"));
        }
        for (field, value) in [
            ("tenant_id", &self.tenant_id),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ] {
            if value.trim().is_empty() {
                return Err(OrielError::config(format!("missing {field}")));
            }
        }
        Ok(())
    }

    pub fn tenant_base_url(&self) -> String {
        format!("{}/{}", self.login_base, self.tenant_id)
    }

    pub fn authorize_url(&self) -> String {
        format!("{}/{}", self.tenant_base_url(), OAUTH_AUTHORIZE_PATH)
    }

    pub fn token_endpoint_url(&self) -> String {
        format!("{}/{}", self.tenant_base_url(), OAUTH_TOKEN_PATH)
    }

    pub fn jwks_url(&self) -> String {
        format!("{}/{}", self.tenant_base_url(), OAUTH_JWKS_PATH)
    }

    /// The `iss` value Entra ID puts in v2.0 ID tokens.
    pub fn issuer_url(&self) -> String {
        format!("{}/v2.0", self.tenant_base_url())
    }

    pub fn graph_url(&self, path: &str) -> String {
        format!("{}{}", self.graph_base, path)
    }
}
