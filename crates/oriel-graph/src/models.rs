//! Remote directory records as Graph returns them

use serde::Deserialize;
use tokio::sync::OnceCell;

use oriel_core::{Nametag, Result};

use crate::client::GraphClient;

/// A directory user, selected down to the fields sync needs.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteUser {
    #[serde(rename = "id")]
    pub external_id: String,
    #[serde(rename = "userPrincipalName", default)]
    pub user_principal_name: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(rename = "givenName", default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
}

impl RemoteUser {
    /// Mail when the directory has one, principal name otherwise.
    pub fn email(&self) -> Option<&str> {
        self.mail
            .as_deref()
            .or(self.user_principal_name.as_deref())
    }

    fn nametag(&self) -> Nametag {
        Nametag::new(
            self.given_name.clone(),
            self.surname.clone(),
            self.display_name.clone(),
        )
    }

    pub fn first_name(&self) -> String {
        self.nametag().first_name()
    }

    pub fn last_name(&self) -> String {
        self.nametag().last_name()
    }
}

/// A member entry of a group listing. Graph mixes users, nested groups
/// and devices in `transitiveMembers`; the type discriminator tells
/// them apart.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DirectoryObject {
    #[serde(rename = "@odata.type", default)]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub user: RemoteUser,
}

pub(crate) const USER_OBJECT_TYPE: &str = "#microsoft.graph.user";

impl DirectoryObject {
    pub fn into_user(self) -> Option<RemoteUser> {
        (self.kind.as_deref() == Some(USER_OBJECT_TYPE)).then_some(self.user)
    }
}

/// A directory group. Members are not part of the listing payload; they
/// are fetched on first use and memoized for the rest of the sync run.
#[derive(Debug, Deserialize)]
pub struct RemoteGroup {
    #[serde(rename = "id")]
    pub external_id: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,

    #[serde(skip)]
    members: OnceCell<Vec<RemoteUser>>,
}

impl RemoteGroup {
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or_default()
    }

    /// Transitive user members, fetched once per group instance.
    pub async fn members(&self, client: &GraphClient) -> Result<&[RemoteUser]> {
        let members = self
            .members
            .get_or_try_init(|| client.group_transitive_members(&self.external_id))
            .await?;
        Ok(members)
    }

    /// Builds a group with its member list already resolved.
    pub fn with_members(
        external_id: impl Into<String>,
        display_name: impl Into<String>,
        members: Vec<RemoteUser>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            display_name: Some(display_name.into()),
            members: OnceCell::from(members),
        }
    }
}
