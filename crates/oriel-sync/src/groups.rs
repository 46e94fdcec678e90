//! Group reconciliation
//!
//! Mirrors directory groups into the local store: find-or-create by
//! external id, a prefixed display name with collision disambiguation,
//! membership deltas against the transitive member list, and deletion of
//! local groups the directory no longer has.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use oriel_core::{GroupAttrs, GroupId, GroupStore, Result, UserId, UserStore};
use oriel_graph::{GraphClient, RemoteGroup};

/// Marks reconciler-owned groups apart from locally created ones.
pub const GROUP_NAME_PREFIX: &str = "🆔 ";

const MAX_GROUP_NAME_CHARS: usize = 255;
const COLLISION_SUFFIX_CHARS: usize = 8;

#[derive(Debug, Clone, Copy, Default)]
pub struct GroupPolicy {
    /// When a user leaves a synced group, also detach them from external
    /// authentication. Off by default; group membership and auth source
    /// are separate concerns in most deployments.
    pub clear_external_link_on_removal: bool,
}

/// What happened to one group during a pass.
#[derive(Debug, Clone)]
pub struct GroupSyncOutcome {
    pub external_id: String,
    pub name: String,
    pub members_added: usize,
    pub members_removed: usize,
    pub error: Option<String>,
}

pub struct GroupReconciler<U: UserStore, G: GroupStore> {
    users: Arc<U>,
    groups: Arc<G>,
    policy: GroupPolicy,
}

impl<U: UserStore, G: GroupStore> GroupReconciler<U, G> {
    pub fn new(users: Arc<U>, groups: Arc<G>, policy: GroupPolicy) -> Self {
        Self {
            users,
            groups,
            policy,
        }
    }

    /// Reconciles every remote group, then deletes local managed groups
    /// absent from `remote`. A failing group is recorded in its outcome
    /// and the pass moves on.
    #[instrument(skip_all, fields(groups = remote.len()))]
    pub async fn reconcile_all(
        &self,
        client: &GraphClient,
        remote: &[RemoteGroup],
    ) -> Result<Vec<GroupSyncOutcome>> {
        info!(groups = remote.len(), "starting group reconciliation");

        let mut outcomes = Vec::with_capacity(remote.len());
        for group in remote {
            match self.reconcile_group(client, group).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(external_id = %group.external_id, error = %e, "group sync failed");
                    outcomes.push(GroupSyncOutcome {
                        external_id: group.external_id.clone(),
                        name: group.name().to_string(),
                        members_added: 0,
                        members_removed: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        self.delete_orphans(remote).await;

        info!(groups = outcomes.len(), "group reconciliation complete");
        Ok(outcomes)
    }

    #[instrument(skip_all, fields(external_id = %remote.external_id))]
    pub async fn reconcile_group(
        &self,
        client: &GraphClient,
        remote: &RemoteGroup,
    ) -> Result<GroupSyncOutcome> {
        let existing = self.groups.find_by_external_id(&remote.external_id).await?;
        let name = self
            .unique_name(remote, existing.as_ref().map(|g| g.id))
            .await?;

        let group = self
            .groups
            .create_or_update(&GroupAttrs {
                external_id: remote.external_id.clone(),
                name: name.clone(),
                synced_at: Utc::now(),
            })
            .await?;

        let (added, removed) = self.sync_members(client, group.id, remote).await?;

        Ok(GroupSyncOutcome {
            external_id: remote.external_id.clone(),
            name,
            members_added: added,
            members_removed: removed,
            error: None,
        })
    }

    /// Set-diffs the transitive member list against current local
    /// membership. Member oids with no local account are left for the
    /// account reconciler to create first.
    async fn sync_members(
        &self,
        client: &GraphClient,
        group: GroupId,
        remote: &RemoteGroup,
    ) -> Result<(usize, usize)> {
        let member_ids: Vec<String> = remote
            .members(client)
            .await?
            .iter()
            .map(|m| m.external_id.clone())
            .collect();

        let desired: HashSet<UserId> = self
            .users
            .find_by_external_ids(&member_ids)
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect();
        let current: HashSet<UserId> = self
            .groups
            .current_members(group)
            .await?
            .into_iter()
            .collect();

        let mut removed = 0;
        for user in current.difference(&desired) {
            self.groups.remove_member(group, *user).await?;
            if self.policy.clear_external_link_on_removal {
                self.users.clear_external_link(*user).await?;
            }
            removed += 1;
        }

        let mut added = 0;
        for user in desired.difference(&current) {
            self.groups.add_member(group, *user).await?;
            added += 1;
        }

        Ok((added, removed))
    }

    /// Prefixed display name, disambiguated when another group already
    /// carries it. Re-running with unchanged input resolves to the same
    /// name.
    async fn unique_name(
        &self,
        remote: &RemoteGroup,
        excluding: Option<GroupId>,
    ) -> Result<String> {
        let base = prefixed_name(remote.name());
        if !self.groups.exists_with_name(&base, excluding).await? {
            return Ok(base);
        }

        let name = disambiguated_name(remote.name(), &remote.external_id);
        info!(%name, "group name taken, disambiguating with external id");
        Ok(name)
    }

    /// Deletes managed local groups whose external id is gone from the
    /// directory. The store cascades membership and role cleanup. A store
    /// failure postpones cleanup to the next pass; the outcomes already
    /// collected still reach the caller.
    async fn delete_orphans(&self, remote: &[RemoteGroup]) {
        let managed = match self.groups.list_managed().await {
            Ok(managed) => managed,
            Err(e) => {
                warn!(error = %e, "could not list managed groups, skipping orphan cleanup");
                return;
            }
        };

        let remote_ids: HashSet<&str> = remote.iter().map(|g| g.external_id.as_str()).collect();

        for local in managed {
            let Some(external_id) = local.external_id.as_deref() else {
                continue;
            };
            if remote_ids.contains(external_id) {
                continue;
            }

            match self.groups.delete_group(local.id).await {
                Ok(()) => info!(name = %local.name, "deleted group missing from directory"),
                Err(e) => warn!(name = %local.name, error = %e, "orphaned group deletion failed"),
            }
        }
    }
}

pub(crate) fn prefixed_name(name: &str) -> String {
    truncate_chars(&format!("{GROUP_NAME_PREFIX}{name}"), MAX_GROUP_NAME_CHARS)
}

/// Appends ` (<first 8 chars of the external id>)`, shrinking the base so
/// the whole name still fits.
pub(crate) fn disambiguated_name(name: &str, external_id: &str) -> String {
    let tag: String = external_id.chars().take(COLLISION_SUFFIX_CHARS).collect();
    let suffix = format!(" ({tag})");
    let budget = MAX_GROUP_NAME_CHARS - suffix.chars().count();
    let base = truncate_chars(&format!("{GROUP_NAME_PREFIX}{name}"), budget);
    format!("{base}{suffix}")
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
