//! Local store entities and attribute sets
//!
//! These mirror what the external user/group store exposes to Oriel. The
//! store itself (schema, persistence) is a collaborator; Oriel only
//! reads and writes through the traits in [`crate::traits`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(pub i64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    /// Registered but awaiting activation.
    Pending,
    Locked,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalUser {
    pub id: UserId,
    pub login: String,
    pub mail: String,
    pub firstname: String,
    pub lastname: String,
    /// Entra object id. Non-null means the account is provider-managed.
    pub external_id: Option<String>,
    pub status: UserStatus,
    pub admin: bool,
    pub locale: Option<String>,
    pub synced_at: Option<DateTime<Utc>>,
}

impl LocalUser {
    /// Provider-managed accounts get their identity fields from Entra;
    /// the regular profile-edit path must not touch them.
    pub fn provider_managed(&self) -> bool {
        self.external_id.is_some()
    }

    pub fn active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalGroup {
    pub id: GroupId,
    pub name: String,
    /// Entra object id. Null means the group was created locally and is
    /// never touched by reconciliation.
    pub external_id: Option<String>,
    pub synced_at: Option<DateTime<Utc>>,
}

impl LocalGroup {
    pub fn provider_managed(&self) -> bool {
        self.external_id.is_some()
    }
}

/// Full attribute set written by the reconciler and the login path.
#[derive(Debug, Clone, PartialEq)]
pub struct UserAttrs {
    pub login: Option<String>,
    pub firstname: String,
    pub lastname: String,
    pub mail: Option<String>,
    pub external_id: Option<String>,
    pub status: Option<UserStatus>,
    pub synced_at: Option<DateTime<Utc>>,
}

/// Partial update coming from the non-provider profile-edit path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub mail: Option<String>,
    pub locale: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupAttrs {
    pub external_id: String,
    pub name: String,
    pub synced_at: DateTime<Utc>,
}
