//! Error types for the Oriel workspace

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrielError {
    /// Timeout, TLS failure, non-2xx response or malformed JSON from any
    /// upstream call. Callers apply their own retry/backoff policy.
    #[error("Network error: {message}")]
    Network { message: String },

    /// The token endpoint rejected the authorization-code exchange.
    #[error("OAuth error: {message}")]
    OAuth { message: String },

    /// ID token signature or claims failed verification.
    #[error("JWT verification error: {message}")]
    JwtVerification { message: String },

    /// Returned or expected OAuth state was missing entirely.
    #[error("Missing OAuth credentials")]
    InvalidCredentials,

    /// Returned state did not match the state issued for this session.
    #[error("Invalid OAuth state")]
    InvalidState,

    /// Decoded nonce did not match the nonce issued for this session.
    #[error("Invalid OAuth nonce")]
    InvalidNonce,

    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A user/group/session store collaborator failed.
    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl OrielError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn oauth(message: impl Into<String>) -> Self {
        Self::OAuth {
            message: message.into(),
        }
    }

    pub fn jwt_verification(message: impl Into<String>) -> Self {
        Self::JwtVerification {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrielError>;
