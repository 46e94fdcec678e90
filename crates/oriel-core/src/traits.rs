//! Collaborator traits for the stores Oriel talks to but does not own

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::identity::IdentityLike;
use crate::models::*;

// =============================================================================
// User store
// =============================================================================

/// Operations Oriel needs from the local user store.
///
/// Email and login lookups are case-insensitive on the store side.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<LocalUser>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<LocalUser>>;
    async fn find_by_login(&self, login: &str) -> Result<Option<LocalUser>>;

    /// Users matching several external ids at once. Principals that are
    /// groups in the local store are not returned.
    async fn find_by_external_ids(&self, external_ids: &[String]) -> Result<Vec<LocalUser>>;

    async fn create(&self, attrs: &UserAttrs) -> Result<LocalUser>;
    async fn update(&self, id: UserId, attrs: &UserAttrs) -> Result<LocalUser>;
    async fn deactivate(&self, id: UserId) -> Result<()>;
    async fn is_admin(&self, id: UserId) -> Result<bool>;
    async fn record_login(&self, id: UserId) -> Result<()>;

    /// Provider-managed users whose `synced_at` predates `since` (or is
    /// null). Candidates for opt-in deactivation after a full pass.
    async fn list_stale_managed(&self, since: DateTime<Utc>) -> Result<Vec<LocalUser>>;

    /// Detaches a user from external authentication. Only called when the
    /// group reconciler's clear-link policy is enabled.
    async fn clear_external_link(&self, id: UserId) -> Result<()>;

    /// Lookup chain used by both the login path and the reconciler:
    /// external id first, then email, then login.
    async fn find_by_identity(&self, identity: &dyn IdentityLike) -> Result<Option<LocalUser>> {
        if let Some(user) = self.find_by_external_id(identity.external_id()).await? {
            return Ok(Some(user));
        }
        if let Some(user) = self.find_by_email(identity.preferred_username()).await? {
            return Ok(Some(user));
        }
        self.find_by_login(identity.preferred_username()).await
    }
}

// =============================================================================
// Group store
// =============================================================================

/// Operations Oriel needs from the local group store.
///
/// `delete_group` must cascade: removing a group retracts its memberships
/// and any role grants inherited solely through them. That guarantee
/// belongs to the store, not to the reconciler.
#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<LocalGroup>>;
    async fn create_or_update(&self, attrs: &GroupAttrs) -> Result<LocalGroup>;
    async fn current_members(&self, id: GroupId) -> Result<Vec<UserId>>;
    async fn add_member(&self, group: GroupId, user: UserId) -> Result<()>;
    async fn remove_member(&self, group: GroupId, user: UserId) -> Result<()>;
    async fn delete_group(&self, id: GroupId) -> Result<()>;

    /// Whether another group (not `excluding`) already carries `name`.
    async fn exists_with_name(&self, name: &str, excluding: Option<GroupId>) -> Result<bool>;

    /// All groups with a non-null external id.
    async fn list_managed(&self) -> Result<Vec<LocalGroup>>;
}

// =============================================================================
// Session store
// =============================================================================

/// Three string values per browser session: state, nonce, PKCE verifier.
/// The storage mechanism (cookie-backed, server-side) is the host's
/// concern.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;

    /// Read and delete in one step, so a half-completed flow can never be
    /// replayed.
    async fn take(&self, key: &str) -> Result<Option<String>> {
        let value = self.get(key).await?;
        self.remove(key).await?;
        Ok(value)
    }
}
