//! Reconciler tests against in-memory store fakes: upsert behavior,
//! idempotence, per-record failure isolation, deactivation guards, group
//! naming and membership deltas.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use oriel_core::{
    EntraConfig, GroupAttrs, GroupId, GroupStore, LocalGroup, LocalUser, OrielError, Result,
    UserAttrs, UserId, UserStatus, UserStore,
};
use oriel_graph::{GraphClient, RemoteGroup, RemoteUser};
use oriel_sync::{AccountPolicy, AccountReconciler, GroupPolicy, GroupReconciler};

// =============================================================================
// In-memory user store
// =============================================================================

#[derive(Default)]
struct MemoryUsers {
    inner: Mutex<UsersInner>,
}

#[derive(Default)]
struct UsersInner {
    next_id: i64,
    users: HashMap<i64, LocalUser>,
    // External ids whose create/update calls fail, for failure-isolation
    // scenarios.
    poisoned: HashSet<String>,
    fail_stale_listing: bool,
    fail_admin_checks: bool,
}

impl MemoryUsers {
    fn seed(&self, mut user: LocalUser) -> LocalUser {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        user.id = UserId(inner.next_id);
        inner.users.insert(user.id.0, user.clone());
        user
    }

    fn poison(&self, external_id: &str) {
        self.inner
            .lock()
            .unwrap()
            .poisoned
            .insert(external_id.to_string());
    }

    fn fail_stale_listing(&self) {
        self.inner.lock().unwrap().fail_stale_listing = true;
    }

    fn fail_admin_checks(&self) {
        self.inner.lock().unwrap().fail_admin_checks = true;
    }

    fn all(&self) -> Vec<LocalUser> {
        let mut users: Vec<_> = self.inner.lock().unwrap().users.values().cloned().collect();
        users.sort_by_key(|u| u.id.0);
        users
    }

    fn by_login(&self, login: &str) -> LocalUser {
        self.all()
            .into_iter()
            .find(|u| u.login.eq_ignore_ascii_case(login))
            .unwrap_or_else(|| panic!("no user with login {login}"))
    }

    fn apply(user: &mut LocalUser, attrs: &UserAttrs) {
        if let Some(login) = &attrs.login {
            user.login = login.clone();
        }
        if let Some(mail) = &attrs.mail {
            user.mail = mail.clone();
        }
        user.firstname = attrs.firstname.clone();
        user.lastname = attrs.lastname.clone();
        if let Some(external_id) = &attrs.external_id {
            user.external_id = Some(external_id.clone());
        }
        if let Some(status) = attrs.status {
            user.status = status;
        }
        if attrs.synced_at.is_some() {
            user.synced_at = attrs.synced_at;
        }
    }
}

#[async_trait]
impl UserStore for MemoryUsers {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<LocalUser>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<LocalUser>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.mail.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<LocalUser>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.login.eq_ignore_ascii_case(login))
            .cloned())
    }

    async fn find_by_external_ids(&self, external_ids: &[String]) -> Result<Vec<LocalUser>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .users
            .values()
            .filter(|u| {
                u.external_id
                    .as_ref()
                    .is_some_and(|id| external_ids.contains(id))
            })
            .cloned()
            .collect())
    }

    async fn create(&self, attrs: &UserAttrs) -> Result<LocalUser> {
        if let Some(external_id) = &attrs.external_id {
            if self.inner.lock().unwrap().poisoned.contains(external_id) {
                return Err(OrielError::store("constraint violation"));
            }
        }
        let mut user = LocalUser {
            id: UserId(0),
            login: String::new(),
            mail: String::new(),
            firstname: String::new(),
            lastname: String::new(),
            external_id: None,
            status: UserStatus::Active,
            admin: false,
            locale: None,
            synced_at: None,
        };
        MemoryUsers::apply(&mut user, attrs);
        Ok(self.seed(user))
    }

    async fn update(&self, id: UserId, attrs: &UserAttrs) -> Result<LocalUser> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(external_id) = &attrs.external_id {
            if inner.poisoned.contains(external_id) {
                return Err(OrielError::store("constraint violation"));
            }
        }
        let user = inner
            .users
            .get_mut(&id.0)
            .ok_or_else(|| OrielError::store(format!("no user {id}")))?;
        MemoryUsers::apply(user, attrs);
        Ok(user.clone())
    }

    async fn deactivate(&self, id: UserId) -> Result<()> {
        if let Some(user) = self.inner.lock().unwrap().users.get_mut(&id.0) {
            user.status = UserStatus::Locked;
        }
        Ok(())
    }

    async fn is_admin(&self, id: UserId) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_admin_checks {
            return Err(OrielError::store("store unavailable"));
        }
        Ok(inner.users.get(&id.0).map(|u| u.admin).unwrap_or(false))
    }

    async fn record_login(&self, _id: UserId) -> Result<()> {
        Ok(())
    }

    async fn list_stale_managed(&self, since: DateTime<Utc>) -> Result<Vec<LocalUser>> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_stale_listing {
            return Err(OrielError::store("store unavailable"));
        }
        Ok(inner
            .users
            .values()
            .filter(|u| u.external_id.is_some())
            .filter(|u| u.synced_at.map(|t| t < since).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn clear_external_link(&self, id: UserId) -> Result<()> {
        if let Some(user) = self.inner.lock().unwrap().users.get_mut(&id.0) {
            user.external_id = None;
        }
        Ok(())
    }
}

// =============================================================================
// In-memory group store
// =============================================================================

#[derive(Default)]
struct MemoryGroups {
    inner: Mutex<GroupsInner>,
}

#[derive(Default)]
struct GroupsInner {
    next_id: i64,
    groups: HashMap<i64, LocalGroup>,
    members: HashMap<i64, HashSet<i64>>,
    poisoned: HashSet<String>,
    fail_managed_listing: bool,
}

impl MemoryGroups {
    fn seed(&self, name: &str, external_id: Option<&str>) -> LocalGroup {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let group = LocalGroup {
            id: GroupId(inner.next_id),
            name: name.to_string(),
            external_id: external_id.map(String::from),
            synced_at: None,
        };
        inner.groups.insert(group.id.0, group.clone());
        group
    }

    fn poison(&self, external_id: &str) {
        self.inner
            .lock()
            .unwrap()
            .poisoned
            .insert(external_id.to_string());
    }

    fn fail_managed_listing(&self) {
        self.inner.lock().unwrap().fail_managed_listing = true;
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .inner
            .lock()
            .unwrap()
            .groups
            .values()
            .map(|g| g.name.clone())
            .collect();
        names.sort();
        names
    }

    fn members_of(&self, id: GroupId) -> HashSet<i64> {
        self.inner
            .lock()
            .unwrap()
            .members
            .get(&id.0)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl GroupStore for MemoryGroups {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<LocalGroup>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .groups
            .values()
            .find(|g| g.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn create_or_update(&self, attrs: &GroupAttrs) -> Result<LocalGroup> {
        let mut inner = self.inner.lock().unwrap();
        if inner.poisoned.contains(&attrs.external_id) {
            return Err(OrielError::store("constraint violation"));
        }

        let existing = inner
            .groups
            .values()
            .find(|g| g.external_id.as_deref() == Some(attrs.external_id.as_str()))
            .map(|g| g.id.0);

        let id = match existing {
            Some(id) => id,
            None => {
                inner.next_id += 1;
                let id = inner.next_id;
                inner.groups.insert(
                    id,
                    LocalGroup {
                        id: GroupId(id),
                        name: String::new(),
                        external_id: Some(attrs.external_id.clone()),
                        synced_at: None,
                    },
                );
                id
            }
        };

        let group = inner.groups.get_mut(&id).unwrap();
        group.name = attrs.name.clone();
        group.synced_at = Some(attrs.synced_at);
        Ok(group.clone())
    }

    async fn current_members(&self, id: GroupId) -> Result<Vec<UserId>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .members
            .get(&id.0)
            .map(|m| m.iter().map(|id| UserId(*id)).collect())
            .unwrap_or_default())
    }

    async fn add_member(&self, group: GroupId, user: UserId) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .members
            .entry(group.0)
            .or_default()
            .insert(user.0);
        Ok(())
    }

    async fn remove_member(&self, group: GroupId, user: UserId) -> Result<()> {
        if let Some(members) = self.inner.lock().unwrap().members.get_mut(&group.0) {
            members.remove(&user.0);
        }
        Ok(())
    }

    async fn delete_group(&self, id: GroupId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.groups.remove(&id.0);
        inner.members.remove(&id.0);
        Ok(())
    }

    async fn exists_with_name(&self, name: &str, excluding: Option<GroupId>) -> Result<bool> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .groups
            .values()
            .any(|g| g.name == name && Some(g.id) != excluding))
    }

    async fn list_managed(&self) -> Result<Vec<LocalGroup>> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_managed_listing {
            return Err(OrielError::store("store unavailable"));
        }
        Ok(inner
            .groups
            .values()
            .filter(|g| g.external_id.is_some())
            .cloned()
            .collect())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn remote_user(id: &str, upn: &str) -> RemoteUser {
    RemoteUser {
        external_id: id.to_string(),
        user_principal_name: Some(upn.to_string()),
        mail: None,
        given_name: Some("Test".to_string()),
        surname: Some("User".to_string()),
        display_name: Some("Test User".to_string()),
    }
}

fn local_user(login: &str, external_id: Option<&str>) -> LocalUser {
    LocalUser {
        id: UserId(0),
        login: login.to_string(),
        mail: login.to_string(),
        firstname: "Old".to_string(),
        lastname: "Name".to_string(),
        external_id: external_id.map(String::from),
        status: UserStatus::Active,
        admin: false,
        locale: None,
        synced_at: None,
    }
}

/// A client for groups whose members are preresolved; nothing is fetched.
fn offline_client() -> GraphClient {
    GraphClient::new(EntraConfig::new("tenant", "client", "secret")).unwrap()
}

// =============================================================================
// Account reconciliation
// =============================================================================

#[tokio::test]
async fn creates_accounts_for_new_directory_users() {
    let users = Arc::new(MemoryUsers::default());
    let reconciler = AccountReconciler::new(users.clone(), AccountPolicy::default());

    let remote = vec![
        remote_user("u1", "jane@contoso.com"),
        remote_user("u2", "john@contoso.com"),
    ];
    let report = reconciler.reconcile(&remote).await.unwrap();

    assert_eq!(report.created(), 2);
    assert_eq!(report.errors(), 0);

    let jane = users.by_login("jane@contoso.com");
    assert_eq!(jane.mail, "jane@contoso.com");
    assert_eq!(jane.firstname, "Test");
    assert_eq!(jane.external_id.as_deref(), Some("u1"));
    assert_eq!(jane.status, UserStatus::Active);
    assert!(jane.synced_at.is_some());
}

#[tokio::test]
async fn adopts_an_existing_account_by_email_and_links_it() {
    let users = Arc::new(MemoryUsers::default());
    users.seed(local_user("jane@contoso.com", None));

    let reconciler = AccountReconciler::new(users.clone(), AccountPolicy::default());
    let report = reconciler
        .reconcile(&[remote_user("u1", "jane@contoso.com")])
        .await
        .unwrap();

    assert_eq!(report.created(), 0);
    assert_eq!(report.updated(), 1);

    let jane = users.by_login("jane@contoso.com");
    assert_eq!(jane.external_id.as_deref(), Some("u1"));
    assert_eq!(jane.firstname, "Test");
}

#[tokio::test]
async fn a_second_run_changes_nothing() {
    let users = Arc::new(MemoryUsers::default());
    let reconciler = AccountReconciler::new(users.clone(), AccountPolicy::default());
    let remote = vec![
        remote_user("u1", "jane@contoso.com"),
        remote_user("u2", "john@contoso.com"),
    ];

    reconciler.reconcile(&remote).await.unwrap();
    let before = users.all();

    let second = reconciler.reconcile(&remote).await.unwrap();
    let after = users.all();

    assert_eq!(second.created(), 0);
    assert_eq!(second.updated(), 2);
    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(after.iter()) {
        assert_eq!((b.id, &b.login, &b.mail), (a.id, &a.login, &a.mail));
        assert_eq!((&b.firstname, &b.lastname), (&a.firstname, &a.lastname));
        assert_eq!(b.status, a.status);
    }
}

#[tokio::test]
async fn directory_renames_do_not_touch_the_login_by_default() {
    let users = Arc::new(MemoryUsers::default());
    users.seed(local_user("jane.old@contoso.com", Some("u1")));

    let reconciler = AccountReconciler::new(users.clone(), AccountPolicy::default());
    reconciler
        .reconcile(&[remote_user("u1", "jane.new@contoso.com")])
        .await
        .unwrap();

    let jane = users.by_login("jane.old@contoso.com");
    // Mail follows the directory; the login stays.
    assert_eq!(jane.mail, "jane.new@contoso.com");
}

#[tokio::test]
async fn directory_renames_follow_into_the_login_when_opted_in() {
    let users = Arc::new(MemoryUsers::default());
    users.seed(local_user("jane.old@contoso.com", Some("u1")));

    let policy = AccountPolicy {
        overwrite_login: true,
        ..AccountPolicy::default()
    };
    let reconciler = AccountReconciler::new(users.clone(), policy);
    reconciler
        .reconcile(&[remote_user("u1", "jane.new@contoso.com")])
        .await
        .unwrap();

    assert_eq!(users.by_login("jane.new@contoso.com").external_id.as_deref(), Some("u1"));
}

#[tokio::test]
async fn reappearing_in_the_directory_reactivates_the_account() {
    let users = Arc::new(MemoryUsers::default());
    let mut jane = local_user("jane@contoso.com", Some("u1"));
    jane.status = UserStatus::Locked;
    users.seed(jane);

    let reconciler = AccountReconciler::new(users.clone(), AccountPolicy::default());
    reconciler
        .reconcile(&[remote_user("u1", "jane@contoso.com")])
        .await
        .unwrap();

    assert_eq!(users.by_login("jane@contoso.com").status, UserStatus::Active);
}

#[tokio::test]
async fn case_only_email_differences_keep_the_local_casing() {
    let users = Arc::new(MemoryUsers::default());
    users.seed(local_user("Jane.Doe@contoso.com", Some("u1")));

    let reconciler = AccountReconciler::new(users.clone(), AccountPolicy::default());
    reconciler
        .reconcile(&[remote_user("u1", "jane.doe@contoso.com")])
        .await
        .unwrap();

    let jane = users.by_login("jane.doe@contoso.com");
    assert_eq!(jane.mail, "Jane.Doe@contoso.com");
    assert_eq!(jane.login, "Jane.Doe@contoso.com");
}

#[tokio::test]
async fn one_bad_record_does_not_abort_the_pass() {
    let users = Arc::new(MemoryUsers::default());
    users.poison("u1");

    let reconciler = AccountReconciler::new(users.clone(), AccountPolicy::default());
    let report = reconciler
        .reconcile(&[
            remote_user("u1", "jane@contoso.com"),
            remote_user("u2", "john@contoso.com"),
        ])
        .await
        .unwrap();

    assert_eq!(report.errors(), 1);
    assert_eq!(report.created(), 1);
    assert_eq!(users.by_login("john@contoso.com").external_id.as_deref(), Some("u2"));
}

#[tokio::test]
async fn users_without_any_address_are_reported_not_created() {
    let users = Arc::new(MemoryUsers::default());
    let reconciler = AccountReconciler::new(users.clone(), AccountPolicy::default());

    let mut remote = remote_user("u1", "ignored");
    remote.user_principal_name = None;
    remote.mail = None;

    let report = reconciler.reconcile(&[remote]).await.unwrap();

    assert_eq!(report.errors(), 1);
    assert!(users.all().is_empty());
}

#[tokio::test]
async fn vanished_users_stay_active_unless_opted_in() {
    let users = Arc::new(MemoryUsers::default());
    let mut stale = local_user("gone@contoso.com", Some("u9"));
    stale.synced_at = Some(Utc::now() - Duration::days(2));
    users.seed(stale);

    let reconciler = AccountReconciler::new(users.clone(), AccountPolicy::default());
    reconciler.reconcile(&[]).await.unwrap();

    assert_eq!(users.by_login("gone@contoso.com").status, UserStatus::Active);
}

#[tokio::test]
async fn vanished_users_are_deactivated_but_admins_are_spared() {
    let users = Arc::new(MemoryUsers::default());

    let mut gone = local_user("gone@contoso.com", Some("u9"));
    gone.synced_at = Some(Utc::now() - Duration::days(2));
    users.seed(gone);

    let mut admin = local_user("root@contoso.com", Some("u10"));
    admin.admin = true;
    admin.synced_at = Some(Utc::now() - Duration::days(2));
    users.seed(admin);

    let mut present = remote_user("u1", "jane@contoso.com");
    present.mail = Some("jane@contoso.com".to_string());

    let policy = AccountPolicy {
        deactivate_missing: true,
        ..AccountPolicy::default()
    };
    let reconciler = AccountReconciler::new(users.clone(), policy);
    let report = reconciler.reconcile(&[present]).await.unwrap();

    assert_eq!(report.deactivated(), 1);
    assert_eq!(report.skipped(), 1);
    assert_eq!(users.by_login("gone@contoso.com").status, UserStatus::Locked);
    assert_eq!(users.by_login("root@contoso.com").status, UserStatus::Active);
    // The user still present in the directory is untouched.
    assert_eq!(users.by_login("jane@contoso.com").status, UserStatus::Active);
}

#[tokio::test]
async fn a_failing_stale_listing_still_returns_the_report() {
    let users = Arc::new(MemoryUsers::default());
    users.fail_stale_listing();

    let policy = AccountPolicy {
        deactivate_missing: true,
        ..AccountPolicy::default()
    };
    let reconciler = AccountReconciler::new(users.clone(), policy);
    let report = reconciler
        .reconcile(&[remote_user("u1", "jane@contoso.com")])
        .await
        .unwrap();

    // The upsert already applied is reported; the cleanup failure is one
    // error record, not a lost pass.
    assert_eq!(report.created(), 1);
    assert_eq!(report.errors(), 1);
    assert_eq!(users.by_login("jane@contoso.com").status, UserStatus::Active);
}

#[tokio::test]
async fn an_admin_check_failure_leaves_the_account_untouched() {
    let users = Arc::new(MemoryUsers::default());
    let mut gone = local_user("gone@contoso.com", Some("u9"));
    gone.synced_at = Some(Utc::now() - Duration::days(2));
    users.seed(gone);
    users.fail_admin_checks();

    let policy = AccountPolicy {
        deactivate_missing: true,
        ..AccountPolicy::default()
    };
    let reconciler = AccountReconciler::new(users.clone(), policy);
    let report = reconciler.reconcile(&[]).await.unwrap();

    assert_eq!(report.deactivated(), 0);
    assert_eq!(report.errors(), 1);
    assert_eq!(users.by_login("gone@contoso.com").status, UserStatus::Active);
}

// =============================================================================
// Group reconciliation
// =============================================================================

#[tokio::test]
async fn creates_prefixed_groups_with_their_members() {
    let users = Arc::new(MemoryUsers::default());
    let jane = users.seed(local_user("jane@contoso.com", Some("u1")));

    let groups = Arc::new(MemoryGroups::default());
    let reconciler = GroupReconciler::new(users, groups.clone(), GroupPolicy::default());

    let remote = vec![RemoteGroup::with_members(
        "g1",
        "Engineering",
        vec![remote_user("u1", "jane@contoso.com")],
    )];
    let outcomes = reconciler
        .reconcile_all(&offline_client(), &remote)
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].name, "🆔 Engineering");
    assert_eq!(outcomes[0].members_added, 1);
    assert_eq!(groups.names(), vec!["🆔 Engineering"]);

    let group = groups.find_by_external_id("g1").await.unwrap().unwrap();
    assert_eq!(groups.members_of(group.id), HashSet::from([jane.id.0]));
}

#[tokio::test]
async fn name_collisions_get_a_stable_external_id_suffix() {
    let users = Arc::new(MemoryUsers::default());
    let groups = Arc::new(MemoryGroups::default());
    groups.seed("🆔 Engineering", Some("other"));

    let reconciler = GroupReconciler::new(users, groups.clone(), GroupPolicy::default());
    let remote = vec![
        RemoteGroup::with_members("abc12345-6789", "Engineering", vec![]),
        RemoteGroup::with_members("other", "Engineering", vec![]),
    ];

    let outcomes = reconciler
        .reconcile_all(&offline_client(), &remote)
        .await
        .unwrap();
    assert_eq!(outcomes[0].name, "🆔 Engineering (abc12345)");

    // A second run keeps the disambiguated name.
    let remote = vec![
        RemoteGroup::with_members("abc12345-6789", "Engineering", vec![]),
        RemoteGroup::with_members("other", "Engineering", vec![]),
    ];
    let outcomes = reconciler
        .reconcile_all(&offline_client(), &remote)
        .await
        .unwrap();
    assert_eq!(outcomes[0].name, "🆔 Engineering (abc12345)");

    let mut names = groups.names();
    names.sort();
    assert_eq!(names, vec!["🆔 Engineering", "🆔 Engineering (abc12345)"]);
}

#[tokio::test]
async fn membership_deltas_add_and_remove() {
    let users = Arc::new(MemoryUsers::default());
    users.seed(local_user("jane@contoso.com", Some("u1")));
    let john = users.seed(local_user("john@contoso.com", Some("u2")));

    let groups = Arc::new(MemoryGroups::default());
    let reconciler = GroupReconciler::new(users, groups.clone(), GroupPolicy::default());

    let first = vec![RemoteGroup::with_members(
        "g1",
        "Engineering",
        vec![remote_user("u1", "jane@contoso.com")],
    )];
    reconciler
        .reconcile_all(&offline_client(), &first)
        .await
        .unwrap();

    // Jane leaves, John joins.
    let second = vec![RemoteGroup::with_members(
        "g1",
        "Engineering",
        vec![remote_user("u2", "john@contoso.com")],
    )];
    let outcomes = reconciler
        .reconcile_all(&offline_client(), &second)
        .await
        .unwrap();

    assert_eq!(outcomes[0].members_added, 1);
    assert_eq!(outcomes[0].members_removed, 1);

    let group = groups.find_by_external_id("g1").await.unwrap().unwrap();
    assert_eq!(groups.members_of(group.id), HashSet::from([john.id.0]));
}

#[tokio::test]
async fn removal_detaches_the_account_when_the_policy_says_so() {
    let users = Arc::new(MemoryUsers::default());
    users.seed(local_user("jane@contoso.com", Some("u1")));

    let groups = Arc::new(MemoryGroups::default());
    let policy = GroupPolicy {
        clear_external_link_on_removal: true,
    };
    let reconciler = GroupReconciler::new(users.clone(), groups, policy);

    let first = vec![RemoteGroup::with_members(
        "g1",
        "Engineering",
        vec![remote_user("u1", "jane@contoso.com")],
    )];
    reconciler
        .reconcile_all(&offline_client(), &first)
        .await
        .unwrap();

    let second = vec![RemoteGroup::with_members("g1", "Engineering", vec![])];
    reconciler
        .reconcile_all(&offline_client(), &second)
        .await
        .unwrap();

    assert!(users.by_login("jane@contoso.com").external_id.is_none());
}

#[tokio::test]
async fn orphaned_managed_groups_are_deleted_but_local_ones_kept() {
    let users = Arc::new(MemoryUsers::default());
    let groups = Arc::new(MemoryGroups::default());
    groups.seed("🆔 Disbanded", Some("g-gone"));
    groups.seed("Local Committee", None);

    let reconciler = GroupReconciler::new(users, groups.clone(), GroupPolicy::default());
    let remote = vec![RemoteGroup::with_members("g1", "Engineering", vec![])];
    reconciler
        .reconcile_all(&offline_client(), &remote)
        .await
        .unwrap();

    assert_eq!(groups.names(), vec!["Local Committee", "🆔 Engineering"]);
}

#[tokio::test]
async fn a_failing_managed_listing_keeps_the_group_outcomes() {
    let users = Arc::new(MemoryUsers::default());
    let groups = Arc::new(MemoryGroups::default());
    groups.seed("🆔 Disbanded", Some("g-gone"));
    groups.fail_managed_listing();

    let reconciler = GroupReconciler::new(users, groups.clone(), GroupPolicy::default());
    let remote = vec![RemoteGroup::with_members("g1", "Engineering", vec![])];
    let outcomes = reconciler
        .reconcile_all(&offline_client(), &remote)
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].error.is_none());
    // Orphan cleanup is postponed; the group survives until the next pass.
    assert_eq!(groups.names(), vec!["🆔 Disbanded", "🆔 Engineering"]);
}

#[tokio::test]
async fn one_failing_group_does_not_abort_the_others() {
    let users = Arc::new(MemoryUsers::default());
    let groups = Arc::new(MemoryGroups::default());
    groups.poison("g1");

    let reconciler = GroupReconciler::new(users, groups.clone(), GroupPolicy::default());
    let remote = vec![
        RemoteGroup::with_members("g1", "Broken", vec![]),
        RemoteGroup::with_members("g2", "Engineering", vec![]),
    ];
    let outcomes = reconciler
        .reconcile_all(&offline_client(), &remote)
        .await
        .unwrap();

    assert!(outcomes[0].error.is_some());
    assert!(outcomes[1].error.is_none());
    assert_eq!(groups.names(), vec!["🆔 Engineering"]);
}
