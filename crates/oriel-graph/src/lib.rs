//! Microsoft Graph client
//!
//! Read-only directory access for user and group synchronization:
//! an app-only (client credentials) token provider, a paginating
//! Graph client and the remote directory records it returns.

pub mod client;
pub mod models;
pub mod token;


pub use client::GraphClient;
pub use models::{RemoteGroup, RemoteUser};
pub use token::AccessTokenProvider;
