//! Authentication service.
//!
//! [`AuthManager`] is the single owner of a browser's authentication state:
//! the signed-in user, the platform session secret, an in-flight flag and the
//! last error. Every operation mutates that state and publishes it through a
//! `watch` channel, so pages and tests observe the same transitions.
//!
//! The manager is rebuilt for each request from the state persisted in the
//! browser session ([`AuthManager::restore`]) and written back afterwards
//! ([`AuthManager::snapshot`]).

mod error;
mod role;

pub use error::AuthError;
pub use role::RoleResolver;

use std::sync::Arc;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::instrument;
use url::Url;

use picture_gallery_core::{Email, Role, TeamId, UserId};

use crate::models::SessionUser;
use crate::platform::{
    NewAccount, NewMembership, OAuthProvider, OAuthRequest, Platform, SessionSecret, unique_id,
};

/// Stored when signup created the account but could not sign it in.
pub const SIGNUP_SESSION_FAILED: &str =
    "Account created but session failed. Please try logging in.";

/// Membership role requested for new admins.
const ADMIN_MEMBERSHIP_ROLE: &str = "owner";

/// Authentication state of one browser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    pub user: Option<SessionUser>,
    /// Platform session secret; present iff the platform knows this browser.
    pub session: Option<SessionSecret>,
    /// True while an operation is in flight. Never persisted.
    #[serde(skip)]
    pub loading: bool,
    /// Human-readable message of the last failed operation.
    pub error: Option<String>,
}

impl AuthState {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(SessionUser::is_admin)
    }
}

/// Where the browser goes after an auth operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRedirect {
    Home,
    AdminDashboard,
    Login,
    VerifyEmail,
}

impl AuthRedirect {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::AdminDashboard => "/admin/dashboard",
            Self::Login => "/auth/login",
            Self::VerifyEmail => "/verify-email",
        }
    }

    /// Landing page after signing in with `role`.
    #[must_use]
    pub const fn for_role(role: Role) -> Self {
        match role {
            Role::Admin => Self::AdminDashboard,
            Role::User => Self::Home,
        }
    }
}

/// Site-level settings the manager needs.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Public base URL; OAuth and email links are built on it.
    pub base_url: Url,
    pub admin_team: TeamId,
}

/// Authentication manager for one browser session.
pub struct AuthManager {
    platform: Arc<dyn Platform>,
    roles: RoleResolver,
    base_url: Url,
    state: watch::Sender<AuthState>,
}

impl AuthManager {
    /// Create a manager with no signed-in user.
    #[must_use]
    pub fn new(platform: Arc<dyn Platform>, settings: AuthSettings) -> Self {
        Self::restore(platform, settings, AuthState::default())
    }

    /// Rebuild a manager from previously persisted state.
    #[must_use]
    pub fn restore(platform: Arc<dyn Platform>, settings: AuthSettings, state: AuthState) -> Self {
        let (state, _) = watch::channel(state);
        Self {
            roles: RoleResolver::new(Arc::clone(&platform), settings.admin_team),
            platform,
            base_url: settings.base_url,
            state,
        }
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn user(&self) -> Option<SessionUser> {
        self.state.borrow().user.clone()
    }

    /// Whether the held user is an admin. No network access.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.state.borrow().is_admin()
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    pub fn clear_error(&self) {
        self.update(|state| state.error = None);
    }

    // =========================================================================
    // Session check
    // =========================================================================

    /// Refresh the user from the platform session.
    ///
    /// The role is re-derived every time. Any failure signs the browser out
    /// locally; nothing is returned to the caller.
    #[instrument(skip(self))]
    pub async fn check_auth(&self) {
        self.update(|state| state.loading = true);

        let session = self.state.borrow().session.clone();
        let checked = match session {
            Some(secret) => match self.platform.get_account(&secret).await {
                Ok(account) => {
                    let role = self.roles.resolve(&secret, &account.id).await.granted_role();
                    Some((SessionUser::from_account(account, role), secret))
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Session check failed, signing out locally");
                    None
                }
            },
            None => None,
        };

        self.update(|state| {
            state.loading = false;
            match checked {
                Some((user, secret)) => {
                    state.user = Some(user);
                    state.session = Some(secret);
                }
                None => {
                    state.user = None;
                    state.session = None;
                }
            }
        });
    }

    // =========================================================================
    // Password authentication
    // =========================================================================

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` for a malformed email and
    /// `AuthError::Platform` if the platform rejects the credentials.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthRedirect, AuthError> {
        self.begin();
        let result = async {
            let email = Email::parse(email)?;
            let session = self
                .platform
                .create_email_password_session(&email, password)
                .await?;
            let secret = session
                .session_secret()
                .ok_or(AuthError::MissingSessionSecret)?;
            self.establish(secret).await
        }
        .await;
        self.finish(result)
    }

    /// Register an account and sign it in.
    ///
    /// Session creation is best effort: on failure the account still exists,
    /// [`SIGNUP_SESSION_FAILED`] is stored and the user is held without a
    /// session. Requesting the admin role invites the user into the admin
    /// team; the role is then derived like on every other check.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Platform` if the account cannot be created.
    #[instrument(skip(self, password, name))]
    pub async fn signup(
        &self,
        email: &str,
        password: &SecretString,
        name: &str,
        requested_role: Role,
    ) -> Result<AuthRedirect, AuthError> {
        self.begin();
        let result = async {
            let email = Email::parse(email)?;
            let account = self
                .platform
                .create_account(&NewAccount {
                    user_id: UserId::new(unique_id()),
                    email: email.clone(),
                    password: password.clone(),
                    name: name.to_string(),
                })
                .await?;
            tracing::info!(user_id = %account.id, "Account created");

            let session = match self
                .platform
                .create_email_password_session(&email, password)
                .await
            {
                Ok(session) => session.session_secret(),
                Err(e) => {
                    tracing::warn!(error = %e, "Session creation after signup failed");
                    None
                }
            };
            if session.is_none() {
                self.update(|state| state.error = Some(SIGNUP_SESSION_FAILED.to_string()));
            }

            let mut role = Role::User;
            if requested_role == Role::Admin {
                match self
                    .request_admin_membership(session.as_ref(), &account.id)
                    .await
                {
                    Ok(()) => {
                        if let Some(secret) = &session {
                            role = self.roles.resolve(secret, &account.id).await.granted_role();
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Admin membership request failed, continuing as user");
                    }
                }
            }

            let mut user = SessionUser::from_account(account, role);
            user.email_verification = false;
            self.update(|state| {
                state.user = Some(user);
                state.session = session;
            });
            Ok(AuthRedirect::Home)
        }
        .await;
        self.finish(result)
    }

    /// Sign out.
    ///
    /// The platform session is deleted if one is active; local state is
    /// cleared whatever the platform answers.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> AuthRedirect {
        self.begin();

        let session = self.state.borrow().session.clone();
        match session {
            Some(secret) => match self.platform.get_session(&secret).await {
                Ok(_) => {
                    if let Err(e) = self.platform.delete_session(&secret).await {
                        tracing::warn!(error = %e, "Failed to delete platform session");
                    }
                }
                Err(e) => tracing::debug!(error = %e, "No active platform session"),
            },
            None => tracing::debug!("Logout without a platform session"),
        }

        self.update(|state| {
            state.user = None;
            state.session = None;
            state.loading = false;
        });
        AuthRedirect::Login
    }

    /// Send a password recovery email.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Platform` if the platform refuses the request.
    #[instrument(skip(self))]
    pub async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        self.begin();
        let result = async {
            let email = Email::parse(email)?;
            let redirect = self.base_url.join("reset-password")?;
            self.platform.create_recovery(&email, &redirect).await?;
            Ok(())
        }
        .await;
        self.finish(result)
    }

    /// Change the display name and re-derive the role.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotAuthenticated` without a session and
    /// `AuthError::Platform` if the update fails.
    #[instrument(skip(self, name))]
    pub async fn update_profile(&self, name: &str) -> Result<(), AuthError> {
        self.begin();
        let result = async {
            let secret = self
                .state
                .borrow()
                .session
                .clone()
                .ok_or(AuthError::NotAuthenticated)?;
            let account = self.platform.update_name(&secret, name.trim()).await?;
            let role = self.roles.resolve(&secret, &account.id).await.granted_role();
            let user = SessionUser::from_account(account, role);
            self.update(|state| state.user = Some(user));
            Ok(())
        }
        .await;
        self.finish(result)
    }

    // =========================================================================
    // OAuth
    // =========================================================================

    /// URL that starts a Google sign-in.
    ///
    /// # Errors
    ///
    /// Returns an error if the callback URLs cannot be built.
    pub fn login_with_google(&self) -> Result<Url, AuthError> {
        self.oauth_url(OAuthProvider::Google, Vec::new())
    }

    /// URL that starts a Google sign-up, asking for profile and email.
    ///
    /// # Errors
    ///
    /// Returns an error if the callback URLs cannot be built.
    pub fn login_with_google_on_signup(&self) -> Result<Url, AuthError> {
        self.oauth_url(
            OAuthProvider::Google,
            vec!["profile".to_string(), "email".to_string()],
        )
    }

    /// Finish an OAuth flow with the one-time token from the callback.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Platform` if the token is invalid or expired.
    #[instrument(skip(self, secret))]
    pub async fn complete_oauth(
        &self,
        user_id: &UserId,
        secret: &SecretString,
    ) -> Result<AuthRedirect, AuthError> {
        self.begin();
        let result = async {
            let session = self
                .platform
                .create_session_from_token(user_id, secret)
                .await?;
            let secret = session
                .session_secret()
                .ok_or(AuthError::MissingSessionSecret)?;
            self.establish(secret).await
        }
        .await;
        self.finish(result)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn oauth_url(&self, provider: OAuthProvider, scopes: Vec<String>) -> Result<Url, AuthError> {
        let request = OAuthRequest {
            provider,
            success: self.base_url.join("auth/oauth/callback")?,
            failure: self.base_url.join("auth/login")?,
            scopes,
        };
        Ok(self.platform.oauth2_token_url(&request)?)
    }

    /// Load the account behind `secret`, derive its role and hold both.
    async fn establish(&self, secret: SessionSecret) -> Result<AuthRedirect, AuthError> {
        let account = self.platform.get_account(&secret).await?;
        let role = self.roles.resolve(&secret, &account.id).await.granted_role();
        let user = SessionUser::from_account(account, role);
        tracing::info!(user_id = %user.id, role = %role, "User signed in");

        self.update(|state| {
            state.user = Some(user);
            state.session = Some(secret);
        });
        Ok(AuthRedirect::for_role(role))
    }

    async fn request_admin_membership(
        &self,
        session: Option<&SessionSecret>,
        user: &UserId,
    ) -> Result<(), AuthError> {
        let request = NewMembership {
            team_id: self.roles.admin_team().clone(),
            user_id: user.clone(),
            roles: vec![ADMIN_MEMBERSHIP_ROLE.to_string()],
            url: self.base_url.join("verify-admin")?,
        };
        self.platform.create_membership(session, &request).await?;
        Ok(())
    }

    fn begin(&self) {
        self.update(|state| {
            state.loading = true;
            state.error = None;
        });
    }

    fn finish<T>(&self, result: Result<T, AuthError>) -> Result<T, AuthError> {
        self.update(|state| {
            state.loading = false;
            if let Err(e) = &result {
                state.error = Some(e.user_message());
            }
        });
        result
    }

    /// Apply `f` and notify subscribers if the state changed.
    fn update(&self, f: impl FnOnce(&mut AuthState)) {
        self.state.send_if_modified(|state| {
            let before = state.clone();
            f(state);
            *state != before
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::platform::MemoryPlatform;
    use crate::platform::memory::{Fault, OAuthIdentity};

    const PASSWORD: &str = "correct-horse";

    fn setup() -> (MemoryPlatform, AuthManager) {
        let base_url = Url::parse("http://gallery.test/").unwrap();
        let platform = MemoryPlatform::new(base_url.clone(), "local");
        platform.add_team(&TeamId::new("admins"), "Admins");
        let manager = AuthManager::new(
            Arc::new(platform.clone()),
            AuthSettings {
                base_url,
                admin_team: TeamId::new("admins"),
            },
        );
        (platform, manager)
    }

    fn password() -> SecretString {
        SecretString::from(PASSWORD)
    }

    #[tokio::test]
    async fn test_admin_login_redirects_to_dashboard() {
        let (platform, manager) = setup();
        let user = platform.add_account("ada@example.com", PASSWORD, "Ada");
        platform.add_membership(&TeamId::new("admins"), &user, true);

        let redirect = manager.login("ada@example.com", &password()).await.unwrap();

        assert_eq!(redirect, AuthRedirect::AdminDashboard);
        assert!(manager.is_admin());
        let state = manager.snapshot();
        assert!(state.session.is_some());
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_user_login_redirects_home() {
        let (platform, manager) = setup();
        platform.add_account("bob@example.com", PASSWORD, "Bob");

        let redirect = manager.login("bob@example.com", &password()).await.unwrap();

        assert_eq!(redirect, AuthRedirect::Home);
        assert!(!manager.is_admin());
        assert_eq!(manager.user().unwrap().role, Role::User);
    }

    #[tokio::test]
    async fn test_login_survives_role_lookup_failure() {
        let (platform, manager) = setup();
        let user = platform.add_account("ada@example.com", PASSWORD, "Ada");
        platform.add_membership(&TeamId::new("admins"), &user, true);
        platform.inject_fault(Fault::TeamLookup);

        let redirect = manager.login("ada@example.com", &password()).await.unwrap();

        assert_eq!(redirect, AuthRedirect::Home);
        assert!(!manager.is_admin());
    }

    #[tokio::test]
    async fn test_failed_login_stores_error() {
        let (platform, manager) = setup();
        platform.add_account("ada@example.com", PASSWORD, "Ada");

        let err = manager
            .login("ada@example.com", &SecretString::from("wrong"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Platform(_)));
        let state = manager.snapshot();
        assert!(state.user.is_none());
        assert!(!state.loading);
        assert_eq!(
            state.error.as_deref(),
            Some("Invalid credentials. Please check the email and password.")
        );

        manager.clear_error();
        assert!(manager.error().is_none());
    }

    #[tokio::test]
    async fn test_invalid_email_makes_no_platform_call() {
        let (platform, manager) = setup();

        let err = manager.login("not-an-email", &password()).await.unwrap_err();

        assert!(matches!(err, AuthError::InvalidEmail(_)));
        assert_eq!(platform.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_check_auth_rederives_role() {
        let (platform, manager) = setup();
        let user = platform.add_account("ada@example.com", PASSWORD, "Ada");
        manager.login("ada@example.com", &password()).await.unwrap();
        assert!(!manager.is_admin());

        platform.add_membership(&TeamId::new("admins"), &user, true);
        manager.check_auth().await;
        assert!(manager.is_admin());
    }

    #[tokio::test]
    async fn test_check_auth_clears_revoked_session() {
        let (platform, manager) = setup();
        platform.add_account("ada@example.com", PASSWORD, "Ada");
        manager.login("ada@example.com", &password()).await.unwrap();

        let secret = manager.snapshot().session.unwrap();
        platform.delete_session(&secret).await.unwrap();
        manager.check_auth().await;

        let state = manager.snapshot();
        assert!(state.user.is_none());
        assert!(state.session.is_none());
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_check_auth_without_session_is_offline() {
        let (platform, manager) = setup();
        manager.check_auth().await;
        assert!(manager.user().is_none());
        assert_eq!(platform.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_logout_clears_state_even_if_deletion_fails() {
        let (platform, manager) = setup();
        let user = platform.add_account("ada@example.com", PASSWORD, "Ada");
        platform.add_membership(&TeamId::new("admins"), &user, true);
        manager.login("ada@example.com", &password()).await.unwrap();
        platform.inject_fault(Fault::SessionDeletion);

        let redirect = manager.logout().await;

        assert_eq!(redirect, AuthRedirect::Login);
        assert!(!manager.is_admin());
        let state = manager.snapshot();
        assert!(state.user.is_none());
        assert!(state.session.is_none());
    }

    #[tokio::test]
    async fn test_logout_deletes_platform_session() {
        let (platform, manager) = setup();
        platform.add_account("ada@example.com", PASSWORD, "Ada");
        manager.login("ada@example.com", &password()).await.unwrap();
        assert_eq!(platform.session_count(), 1);

        manager.logout().await;
        assert_eq!(platform.session_count(), 0);
    }

    #[tokio::test]
    async fn test_signup_holds_unverified_user() {
        let (platform, manager) = setup();

        let redirect = manager
            .signup("new@example.com", &password(), "Newcomer", Role::User)
            .await
            .unwrap();

        assert_eq!(redirect, AuthRedirect::Home);
        let state = manager.snapshot();
        let user = state.user.unwrap();
        assert_eq!(user.name, "Newcomer");
        assert!(!user.email_verification);
        assert!(state.session.is_some());
        assert!(platform.account_by_email("new@example.com").is_some());
    }

    #[tokio::test]
    async fn test_signup_continues_when_session_fails() {
        let (platform, manager) = setup();
        platform.inject_fault(Fault::SessionCreation);

        manager
            .signup("new@example.com", &password(), "Newcomer", Role::User)
            .await
            .unwrap();

        let state = manager.snapshot();
        assert!(state.user.is_some());
        assert!(state.session.is_none());
        assert_eq!(state.error.as_deref(), Some(SIGNUP_SESSION_FAILED));
    }

    #[tokio::test]
    async fn test_admin_signup_creates_pending_membership() {
        let (platform, manager) = setup();

        manager
            .signup("boss@example.com", &password(), "Boss", Role::Admin)
            .await
            .unwrap();

        let user = manager.user().unwrap();
        let memberships = platform.memberships_of(&user.id);
        assert_eq!(memberships.len(), 1);
        assert_eq!(memberships[0].roles, vec!["owner".to_string()]);
        // The invitation is not confirmed yet, so no admin rights.
        assert!(!manager.is_admin());

        platform.confirm_membership(&TeamId::new("admins"), &user.id);
        manager.check_auth().await;
        assert!(manager.is_admin());
    }

    #[tokio::test]
    async fn test_admin_signup_downgrades_when_membership_fails() {
        let (platform, manager) = setup();
        platform.inject_fault(Fault::MembershipCreation);

        let result = manager
            .signup("boss@example.com", &password(), "Boss", Role::Admin)
            .await;

        assert!(result.is_ok());
        assert!(!manager.is_admin());
        assert!(manager.error().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_signup_fails() {
        let (platform, manager) = setup();
        platform.add_account("ada@example.com", PASSWORD, "Ada");

        let err = manager
            .signup("ada@example.com", &password(), "Ada", Role::User)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Platform(ref e) if e.is_conflict()));
        assert!(manager.user().is_none());
        assert!(manager.error().is_some());
    }

    #[tokio::test]
    async fn test_reset_password_links_back_to_site() {
        let (platform, manager) = setup();
        platform.add_account("ada@example.com", PASSWORD, "Ada");

        manager.reset_password("ada@example.com").await.unwrap();

        let recoveries = platform.recoveries();
        assert_eq!(recoveries.len(), 1);
        assert_eq!(
            recoveries[0].1.as_str(),
            "http://gallery.test/reset-password"
        );
    }

    #[tokio::test]
    async fn test_update_profile_requires_session() {
        let (_platform, manager) = setup();
        let err = manager.update_profile("Someone").await.unwrap_err();
        assert!(matches!(err, AuthError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_update_profile_renames_user() {
        let (platform, manager) = setup();
        platform.add_account("ada@example.com", PASSWORD, "Ada");
        manager.login("ada@example.com", &password()).await.unwrap();

        manager.update_profile("  Ada Lovelace ").await.unwrap();

        assert_eq!(manager.user().unwrap().name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_oauth_urls() {
        let (_platform, manager) = setup();
        // Without a configured identity the memory platform declines consent.
        assert_eq!(
            manager.login_with_google().unwrap().as_str(),
            "http://gallery.test/auth/login"
        );
        assert!(manager.login_with_google_on_signup().is_ok());
    }

    #[tokio::test]
    async fn test_complete_oauth_signs_in() {
        let (platform, manager) = setup();
        platform.set_oauth_identity(Some(OAuthIdentity {
            email: "grace@example.com".to_string(),
            name: "Grace".to_string(),
        }));

        let url = manager.login_with_google().unwrap();
        assert_eq!(url.path(), "/auth/oauth/callback");
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

        let redirect = manager
            .complete_oauth(
                &UserId::new(params["userId"].clone()),
                &SecretString::from(params["secret"].clone()),
            )
            .await
            .unwrap();

        assert_eq!(redirect, AuthRedirect::Home);
        assert_eq!(manager.user().unwrap().email, "grace@example.com");
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let (platform, manager) = setup();
        platform.add_account("ada@example.com", PASSWORD, "Ada");
        let mut rx = manager.subscribe();

        manager.login("ada@example.com", &password()).await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().user.is_some());
    }

    #[tokio::test]
    async fn test_restore_round_trips_through_session_store() {
        let (platform, manager) = setup();
        platform.add_account("ada@example.com", PASSWORD, "Ada");
        manager.login("ada@example.com", &password()).await.unwrap();

        let json = serde_json::to_string(&manager.snapshot()).unwrap();
        let restored: AuthState = serde_json::from_str(&json).unwrap();
        let manager = AuthManager::restore(
            Arc::new(platform),
            AuthSettings {
                base_url: Url::parse("http://gallery.test/").unwrap(),
                admin_team: TeamId::new("admins"),
            },
            restored,
        );

        manager.check_auth().await;
        assert_eq!(manager.user().unwrap().email, "ada@example.com");
    }
}
