//! Account reconciliation
//!
//! Upserts every directory user into the local store. Each record gets
//! its own [`SyncRecord`]; one bad record never aborts the pass.
//! Deactivation of users that vanished from the directory is opt-in and
//! never touches administrators.

use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use tracing::{info, instrument, warn};

use oriel_core::{LocalUser, Result, UserAttrs, UserStatus, UserStore};
use oriel_graph::RemoteUser;

use crate::result::{SyncOperation, SyncRecord, SyncReport};

#[derive(Debug, Clone, Copy, Default)]
pub struct AccountPolicy {
    /// Follow directory renames of the principal name into the local
    /// login. Off by default: logins are referenced all over a host
    /// application and renames there are disruptive.
    pub overwrite_login: bool,
    /// Deactivate provider-managed accounts that no longer appear in the
    /// directory.
    pub deactivate_missing: bool,
}

pub struct AccountReconciler<U: UserStore> {
    users: Arc<U>,
    policy: AccountPolicy,
}

impl<U: UserStore> AccountReconciler<U> {
    pub fn new(users: Arc<U>, policy: AccountPolicy) -> Self {
        Self { users, policy }
    }

    /// Runs one full pass over `remote`. The pass timestamp is taken once
    /// and stamped on every touched record, so staleness checks afterwards
    /// have a single cut-off.
    #[instrument(skip_all, fields(remote = remote.len()))]
    pub async fn reconcile(&self, remote: &[RemoteUser]) -> Result<SyncReport> {
        let sync_time = pass_timestamp();
        let mut report = SyncReport::default();

        info!(users = remote.len(), "starting account reconciliation");

        for user in remote {
            match self.sync_user(user, sync_time).await {
                Ok(record) => report.push(record),
                Err(e) => {
                    warn!(external_id = %user.external_id, error = %e, "account sync failed");
                    report.push(SyncRecord::failure(
                        &user.external_id,
                        user.email().map(String::from),
                        e.to_string(),
                    ));
                }
            }
        }

        if self.policy.deactivate_missing {
            self.deactivate_stale(sync_time, &mut report).await;
        }

        info!(%report, "account reconciliation complete");
        Ok(report)
    }

    async fn sync_user(&self, remote: &RemoteUser, sync_time: DateTime<Utc>) -> Result<SyncRecord> {
        match self.find_local(remote).await? {
            Some(local) => {
                let attrs = self.update_attrs(remote, &local, sync_time);
                let updated = self.users.update(local.id, &attrs).await?;
                Ok(SyncRecord::success(
                    SyncOperation::Updated,
                    &remote.external_id,
                    Some(updated.login),
                ))
            }
            None => {
                let attrs = self.create_attrs(remote, sync_time)?;
                let created = self.users.create(&attrs).await?;
                info!(login = %created.login, "created account from directory");
                Ok(SyncRecord::success(
                    SyncOperation::Created,
                    &remote.external_id,
                    Some(created.login),
                ))
            }
        }
    }

    /// External id first, then email, then login, so accounts created
    /// before the directory link existed get adopted.
    async fn find_local(&self, remote: &RemoteUser) -> Result<Option<LocalUser>> {
        if let Some(user) = self.users.find_by_external_id(&remote.external_id).await? {
            return Ok(Some(user));
        }
        let Some(email) = remote.email() else {
            return Ok(None);
        };
        if let Some(user) = self.users.find_by_email(email).await? {
            return Ok(Some(user));
        }
        self.users.find_by_login(email).await
    }

    fn create_attrs(&self, remote: &RemoteUser, sync_time: DateTime<Utc>) -> Result<UserAttrs> {
        let email = remote.email().ok_or_else(|| {
            oriel_core::OrielError::internal(format!(
                "directory user {} has neither mail nor principal name",
                remote.external_id
            ))
        })?;

        Ok(UserAttrs {
            login: Some(email.to_string()),
            firstname: remote.first_name(),
            lastname: remote.last_name(),
            mail: Some(email.to_string()),
            external_id: Some(remote.external_id.clone()),
            status: Some(UserStatus::Active),
            synced_at: Some(sync_time),
        })
    }

    fn update_attrs(
        &self,
        remote: &RemoteUser,
        local: &LocalUser,
        sync_time: DateTime<Utc>,
    ) -> UserAttrs {
        let email = remote.email();

        // A case-only difference keeps whatever the local store has; users
        // notice their address changing capitalization.
        let mail = email
            .filter(|e| !local.mail.eq_ignore_ascii_case(e))
            .map(String::from);

        let login = email
            .filter(|_| self.policy.overwrite_login)
            .filter(|e| !local.login.eq_ignore_ascii_case(e))
            .map(String::from);

        UserAttrs {
            login,
            firstname: remote.first_name(),
            lastname: remote.last_name(),
            mail,
            external_id: Some(remote.external_id.clone()),
            // Presence in the directory reactivates an account a previous
            // pass deactivated.
            status: Some(UserStatus::Active),
            synced_at: Some(sync_time),
        }
    }

    /// Provider-managed accounts the pass did not touch are gone from the
    /// directory. Administrators are skipped so a misconfigured tenant
    /// cannot lock everyone out. Store failures here land in the report;
    /// the upserts already applied are never discarded.
    async fn deactivate_stale(&self, sync_time: DateTime<Utc>, report: &mut SyncReport) {
        let stale = match self.users.list_stale_managed(sync_time).await {
            Ok(stale) => stale,
            Err(e) => {
                warn!(error = %e, "could not list stale accounts");
                report.push(SyncRecord::failure(
                    "",
                    None,
                    format!("stale-account listing failed: {e}"),
                ));
                return;
            }
        };

        for user in stale {
            let external_id = user.external_id.clone().unwrap_or_default();

            match self.users.is_admin(user.id).await {
                Ok(true) => {
                    warn!(login = %user.login, "not deactivating administrator missing from directory");
                    report.push(SyncRecord::success(
                        SyncOperation::Skipped,
                        external_id,
                        Some(user.login),
                    ));
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(login = %user.login, error = %e, "admin check failed, leaving account untouched");
                    report.push(SyncRecord::failure(external_id, Some(user.login), e.to_string()));
                    continue;
                }
            }
            if !user.active() {
                continue;
            }

            match self.users.deactivate(user.id).await {
                Ok(()) => {
                    info!(login = %user.login, "deactivated account missing from directory");
                    report.push(SyncRecord::success(
                        SyncOperation::Deactivated,
                        external_id,
                        Some(user.login),
                    ));
                }
                Err(e) => {
                    warn!(login = %user.login, error = %e, "deactivation failed");
                    report.push(SyncRecord::failure(external_id, Some(user.login), e.to_string()));
                }
            }
        }
    }
}

/// One timestamp per pass, at second precision so it survives storage
/// backends that drop sub-second fields.
fn pass_timestamp() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(0).unwrap_or(now)
}
