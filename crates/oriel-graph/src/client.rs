//! Paginating Graph client
//!
//! Every listing follows `@odata.nextLink` until the directory is
//! exhausted, asks for the largest page Graph allows and selects only
//! the fields sync consumes. A fresh bearer token is taken per page so
//! long runs survive token expiry.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

use oriel_core::http::{read_json, BULK_READ_TIMEOUT};
use oriel_core::{EntraConfig, HttpClient, Result};

use crate::models::{DirectoryObject, RemoteGroup, RemoteUser};
use crate::token::AccessTokenProvider;

/// The maximum Graph will serve per page.
const PAGE_SIZE: u32 = 999;

const USER_SELECT: &str = "id,userPrincipalName,mail,givenName,surname,displayName";
const GROUP_SELECT: &str = "id,displayName";

/// One page of a Graph listing.
#[derive(Debug, Deserialize)]
pub(crate) struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

pub struct GraphClient {
    config: EntraConfig,
    http: HttpClient,
    tokens: AccessTokenProvider,
}

impl GraphClient {
    pub fn new(config: EntraConfig) -> Result<Self> {
        let tokens = AccessTokenProvider::new(config.clone())?;
        Ok(Self {
            config,
            http: HttpClient::with_read_timeout(BULK_READ_TIMEOUT)?,
            tokens,
        })
    }

    /// All users in the tenant.
    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<RemoteUser>> {
        let url = self
            .config
            .graph_url(&format!("/users?$select={USER_SELECT}&$top={PAGE_SIZE}"));
        self.fetch_all(url).await
    }

    /// All groups in the tenant. Members are not included; see
    /// [`RemoteGroup::members`].
    #[instrument(skip(self))]
    pub async fn list_groups(&self) -> Result<Vec<RemoteGroup>> {
        let url = self
            .config
            .graph_url(&format!("/groups?$select={GROUP_SELECT}&$top={PAGE_SIZE}"));
        self.fetch_all(url).await
    }

    /// Transitive membership of a group, flattened through nested groups
    /// and filtered down to user objects.
    #[instrument(skip(self))]
    pub async fn group_transitive_members(&self, group_id: &str) -> Result<Vec<RemoteUser>> {
        let url = self.config.graph_url(&format!(
            "/groups/{group_id}/transitiveMembers?$select={USER_SELECT}&$top={PAGE_SIZE}"
        ));
        let objects: Vec<DirectoryObject> = self.fetch_all(url).await?;
        Ok(objects
            .into_iter()
            .filter_map(DirectoryObject::into_user)
            .collect())
    }

    /// Looks a single user up by an exact attribute match, e.g.
    /// `find_user_by("userPrincipalName", "jane@contoso.com")`.
    #[instrument(skip(self, value))]
    pub async fn find_user_by(&self, field: &str, value: &str) -> Result<Option<RemoteUser>> {
        let filter = format!("{field} eq '{}'", escape_filter_value(value));
        let url = self.config.graph_url(&format!(
            "/users?$filter={}&$select={USER_SELECT}",
            urlencoding::encode(&filter)
        ));

        let token = self.tokens.get().await?;
        let page: Page<RemoteUser> = read_json(self.http.get_bearer(&url, &token).await?).await?;
        Ok(page.value.into_iter().next())
    }

    async fn fetch_all<T: DeserializeOwned>(&self, first_url: String) -> Result<Vec<T>> {
        let mut records = Vec::new();
        let mut url = Some(first_url);
        let mut pages = 0u32;

        while let Some(current) = url {
            let token = self.tokens.get().await?;
            let page: Page<T> = read_json(self.http.get_bearer(&current, &token).await?).await?;

            pages += 1;
            records.extend(page.value);
            url = page.next_link;
        }

        debug!(pages, records = records.len(), "listing complete");
        Ok(records)
    }
}

/// Single quotes double up inside OData string literals.
pub(crate) fn escape_filter_value(value: &str) -> String {
    value.replace('\'', "''")
}
