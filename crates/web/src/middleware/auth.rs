//! Authentication extractors.
//!
//! The browser's [`AuthState`] lives in the tower-sessions session. Each
//! extractor rebuilds an [`AuthManager`] from it; handlers drive the manager
//! and call [`Auth::save`] to write the state back.
//!
//! | Extractor      | Runs `check_auth` | Rejects                              |
//! |----------------|-------------------|--------------------------------------|
//! | [`Auth`]       | no                | never                                |
//! | [`CurrentUser`]| yes               | never                                |
//! | [`RequireUser`]| yes               | signed out: redirect to login        |
//! | [`RequireAdmin`]| yes              | signed out: redirect; non-admin: 403 |

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::models::{SessionUser, session_keys};
use crate::services::{AuthManager, AuthRedirect, AuthState};
use crate::state::AppState;

/// The browser's auth manager plus the session it was loaded from.
pub struct Auth {
    manager: AuthManager,
    session: Session,
    persisted: AuthState,
}

impl Auth {
    /// Load the auth state stored in `session`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Session` if the session store cannot be read.
    pub async fn load(state: &AppState, session: Session) -> Result<Self, AppError> {
        let persisted: AuthState = session
            .get(session_keys::AUTH_STATE)
            .await?
            .unwrap_or_default();
        let manager = state.auth_manager(persisted.clone());
        Ok(Self {
            manager,
            session,
            persisted,
        })
    }

    #[must_use]
    pub const fn manager(&self) -> &AuthManager {
        &self.manager
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn user(&self) -> Option<SessionUser> {
        self.manager.user()
    }

    /// Take the last error message, clearing it from the state.
    pub fn take_error(&self) -> Option<String> {
        let error = self.manager.error();
        if error.is_some() {
            self.manager.clear_error();
        }
        error
    }

    /// Write the manager's state back to the session if it changed.
    ///
    /// The Sentry user follows the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Session` if the session store cannot be written.
    pub async fn save(&mut self) -> Result<(), AppError> {
        let current = self.manager.snapshot();
        if current == self.persisted {
            return Ok(());
        }

        if current.user.as_ref().map(|u| &u.id) != self.persisted.user.as_ref().map(|u| &u.id) {
            match &current.user {
                Some(user) => set_sentry_user(&user.id, Some(&user.email)),
                None => clear_sentry_user(),
            }
            // New identity, new session id.
            self.session.cycle_id().await?;
        }

        self.session
            .insert(session_keys::AUTH_STATE, &current)
            .await?;
        self.persisted = current;
        Ok(())
    }
}

impl FromRequestParts<AppState> for Auth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;
        Self::load(state, session).await
    }
}

/// Load the auth state and re-check it against the platform.
async fn checked(parts: &mut Parts, state: &AppState) -> Result<Auth, AppError> {
    let mut auth = Auth::from_request_parts(parts, state).await?;
    auth.manager.check_auth().await;
    auth.save().await?;
    Ok(auth)
}

/// Extractor for pages that adapt to the signed-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(CurrentUser { user, .. }: CurrentUser) -> impl IntoResponse {
///     match user {
///         Some(u) => format!("Hello, {}!", u.display_name()),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
pub struct CurrentUser {
    pub user: Option<SessionUser>,
    pub auth: Auth,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = checked(parts, state).await?;
        Ok(Self {
            user: auth.user(),
            auth,
        })
    }
}

/// Error returned when a page needs a user the browser does not have.
#[derive(Debug)]
pub enum AuthRejection {
    /// Redirect to login page.
    RedirectToLogin,
    /// Signed in, but not an admin.
    Forbidden,
    /// The auth state could not be loaded.
    Failed(AppError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(AuthRedirect::Login.path()).into_response(),
            Self::Forbidden => {
                AppError::Forbidden("Admin access required".to_string()).into_response()
            }
            Self::Failed(e) => e.into_response(),
        }
    }
}

impl From<AppError> for AuthRejection {
    fn from(e: AppError) -> Self {
        Self::Failed(e)
    }
}

/// Extractor that requires a signed-in user.
pub struct RequireUser {
    pub user: SessionUser,
    pub auth: Auth,
}

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = checked(parts, state).await?;
        let user = auth.user().ok_or(AuthRejection::RedirectToLogin)?;
        Ok(Self { user, auth })
    }
}

/// Extractor that requires a signed-in admin.
///
/// The role is whatever the fresh `check_auth` derived, so revoking the team
/// membership takes effect on the next request.
pub struct RequireAdmin {
    pub user: SessionUser,
    pub auth: Auth,
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireUser { user, auth } = RequireUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::info!(user_id = %user.id, path = %parts.uri.path(), "Non-admin refused");
            return Err(AuthRejection::Forbidden);
        }
        Ok(Self { user, auth })
    }
}
