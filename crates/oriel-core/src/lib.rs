//! Oriel Core - shared types for Entra ID authentication and directory sync
//!
//! This crate holds everything the protocol crates (`oriel-oauth`,
//! `oriel-graph`) and the reconciliation crate (`oriel-sync`) have in
//! common: the workspace error type, the explicit `EntraConfig`, a small
//! HTTP wrapper with uniform network-error reporting, the normalized
//! post-verification `Identity`, and the traits describing the local
//! user/group/session stores Oriel collaborates with but does not own.

pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod models;
pub mod policy;
pub mod traits;


pub use config::{EntraConfig, RegistrationPolicy};
pub use error::{OrielError, Result};
pub use http::HttpClient;
pub use identity::{Identity, IdentityLike, Nametag};
pub use models::*;
pub use policy::sanitize_profile_update;
pub use traits::*;
