//! Oriel OAuth - OIDC authorization-code flow with PKCE against Entra ID
//!
//! The flow has two entry points: [`LoginFlow::begin`] generates the
//! per-login secrets (state, nonce, PKCE verifier), parks them in the
//! caller's session store and returns the authorize URL; on callback,
//! [`LoginFlow::complete`] consumes those secrets exactly once, exchanges
//! the code, verifies the ID token against the cached provider key set
//! and returns a normalized [`oriel_core::Identity`].

pub mod authorization;
pub mod jwks;
pub mod login;


pub use authorization::{Authorization, AuthorizationRequest};
pub use jwks::{Jwk, JwkSet, KeySetCache};
pub use login::{LoginFlow, LoginOutcome, LoginService};
