//! Session-backed login orchestration
//!
//! [`LoginFlow`] owns the session side of the flow: `begin` parks the
//! three per-login secrets in the session store, `complete` consumes
//! them exactly once - on every path, success or failure - before any
//! validation runs, so a half-completed flow can never be replayed.
//!
//! [`LoginService`] maps a verified identity onto the local user store:
//! sync an existing account or register a new one per policy.

use std::sync::Arc;

use tracing::{info, instrument};

use oriel_core::{
    Identity, IdentityLike, LocalUser, OrielError, RegistrationPolicy, Result, SessionStore,
    UserStatus, UserStore,
};

use crate::authorization::{Authorization, AuthorizationRequest};

pub const SESSION_STATE_KEY: &str = "entra_state";
pub const SESSION_NONCE_KEY: &str = "entra_nonce";
pub const SESSION_VERIFIER_KEY: &str = "entra_pkce_verifier";

pub struct LoginFlow<S: SessionStore> {
    authorization: Authorization,
    sessions: Arc<S>,
}

impl<S: SessionStore> LoginFlow<S> {
    pub fn new(authorization: Authorization, sessions: Arc<S>) -> Self {
        Self {
            authorization,
            sessions,
        }
    }

    /// Generates fresh secrets, stores them in the session and returns
    /// the provider authorize URL to redirect the browser to.
    #[instrument(skip(self))]
    pub async fn begin(&self, redirect_uri: &str) -> Result<String> {
        let request = AuthorizationRequest::new(redirect_uri);

        self.sessions.set(SESSION_STATE_KEY, &request.state).await?;
        self.sessions.set(SESSION_NONCE_KEY, &request.nonce).await?;
        self.sessions
            .set(SESSION_VERIFIER_KEY, &request.code_verifier)
            .await?;

        Ok(self.authorization.authorize_url(&request))
    }

    /// Callback entry point. The session secrets are taken (read and
    /// deleted) up front; whatever happens next, they are gone.
    #[instrument(skip(self, code))]
    pub async fn complete(&self, code: &str, returned_state: &str, redirect_uri: &str) -> Result<Identity> {
        let state = self.sessions.take(SESSION_STATE_KEY).await?;
        let nonce = self.sessions.take(SESSION_NONCE_KEY).await?;
        let verifier = self.sessions.take(SESSION_VERIFIER_KEY).await?;

        let (Some(state), Some(nonce), Some(verifier)) = (state, nonce, verifier) else {
            return Err(OrielError::InvalidCredentials);
        };

        let request = AuthorizationRequest::restore(redirect_uri, verifier, state, nonce);
        self.authorization
            .exchange_code(code, returned_state, &request)
            .await
    }
}

/// Outcome of mapping a verified identity onto the local store.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// Known, active account; profile synced from the identity.
    SignedIn(LocalUser),
    /// Known account that is locked or pending activation.
    Inactive(LocalUser),
    /// First login; a new account was registered per policy.
    Registered(LocalUser),
    /// First login, but self-registration is disabled.
    RegistrationClosed,
}

pub struct LoginService<U: UserStore> {
    users: Arc<U>,
    registration: RegistrationPolicy,
}

impl<U: UserStore> LoginService<U> {
    pub fn new(users: Arc<U>, registration: RegistrationPolicy) -> Self {
        Self {
            users,
            registration,
        }
    }

    /// Finds the local account for `identity` (external id, then email,
    /// then login), syncs its profile, or registers a new one.
    #[instrument(skip_all, fields(external_id = %identity.external_id))]
    pub async fn sign_in(&self, identity: &Identity) -> Result<LoginOutcome> {
        if let Some(user) = self.users.find_by_identity(identity).await? {
            return self.sync_existing(user, identity).await;
        }

        match self.registration {
            RegistrationPolicy::Disabled => {
                info!("unknown identity and self-registration is disabled");
                Ok(LoginOutcome::RegistrationClosed)
            }
            RegistrationPolicy::Automatic => {
                let user = self.register(identity, UserStatus::Active).await?;
                Ok(LoginOutcome::Registered(user))
            }
            RegistrationPolicy::Pending => {
                let user = self.register(identity, UserStatus::Pending).await?;
                Ok(LoginOutcome::Registered(user))
            }
        }
    }

    async fn sync_existing(&self, user: LocalUser, identity: &Identity) -> Result<LoginOutcome> {
        // Login and mail stay as the local store has them; renames flow
        // in through directory sync, not through sign-in.
        let mut attrs = identity.to_user_attrs();
        attrs.login = None;
        attrs.mail = None;
        attrs.status = None;

        let user = self.users.update(user.id, &attrs).await?;

        if user.active() {
            self.users.record_login(user.id).await?;
            info!(user = %user.id, "signed in");
            Ok(LoginOutcome::SignedIn(user))
        } else {
            Ok(LoginOutcome::Inactive(user))
        }
    }

    async fn register(&self, identity: &Identity, status: UserStatus) -> Result<LocalUser> {
        let mut attrs = identity.to_user_attrs();
        attrs.status = Some(status);

        let user = self.users.create(&attrs).await?;
        info!(user = %user.id, "registered new account on first login");
        Ok(user)
    }
}
