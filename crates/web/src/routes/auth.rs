//! Authentication route handlers.
//!
//! Handles email/password login, signup, logout, password recovery and the
//! Google OAuth token flow. Failed form posts re-render the page with the
//! message the auth manager recorded; successful ones redirect to the
//! manager's landing page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::Query,
    response::{IntoResponse, Redirect, Response},
};
use secrecy::SecretString;
use serde::Deserialize;

use picture_gallery_core::{Role, UserId};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{Auth, CurrentUser};
use crate::models::SessionUser;
use crate::services::{SignupError, SignupForm};

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Forgot password form data.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
}

/// Query parameters of the OAuth success redirect.
#[derive(Deserialize)]
pub struct OAuthCallbackQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    pub secret: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub user: Option<SessionUser>,
    pub error: Option<String>,
    pub email: String,
}

/// Signup page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub user: Option<SessionUser>,
    pub error: Option<String>,
    pub name: String,
    pub email: String,
    pub admin_requested: bool,
}

/// Forgot password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/forgot_password.html")]
pub struct ForgotPasswordTemplate {
    pub user: Option<SessionUser>,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Email verification notice template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/verify_email.html")]
pub struct VerifyEmailTemplate {
    pub user: Option<SessionUser>,
    pub error: Option<String>,
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
///
/// Shows (and clears) any error left by an earlier auth operation, such as a
/// failed OAuth completion.
pub async fn login_page(CurrentUser { user, mut auth }: CurrentUser) -> Result<Response> {
    let error = auth.take_error();
    auth.save().await?;
    Ok(LoginTemplate {
        user,
        error,
        email: String::new(),
    }
    .into_response())
}

/// Handle login form submission.
///
/// Admins land on the dashboard, everyone else on the home page.
pub async fn login(mut auth: Auth, Form(form): Form<LoginForm>) -> Result<Response> {
    let password = SecretString::from(form.password);
    let result = auth.manager().login(&form.email, &password).await;
    let error = auth.take_error();
    auth.save().await?;

    match result {
        Ok(redirect) => {
            add_breadcrumb("auth", "Logged in", None);
            Ok(Redirect::to(redirect.path()).into_response())
        }
        Err(e) => {
            tracing::info!(error = %e, "Login failed");
            Ok(LoginTemplate {
                user: auth.user(),
                error: error.or_else(|| Some(e.user_message())),
                email: form.email,
            }
            .into_response())
        }
    }
}

// =============================================================================
// Signup Routes
// =============================================================================

/// Display the signup page.
pub async fn signup_page(CurrentUser { user, mut auth }: CurrentUser) -> Result<Response> {
    let error = auth.take_error();
    auth.save().await?;
    Ok(SignupTemplate {
        user,
        error,
        name: String::new(),
        email: String::new(),
        admin_requested: false,
    }
    .into_response())
}

/// Handle signup form submission.
///
/// Validation failures never reach the platform. On success the browser goes
/// to the email verification notice.
pub async fn signup(mut auth: Auth, Form(form): Form<SignupForm>) -> Result<Response> {
    let result = form.submit(auth.manager()).await;

    match result {
        Ok(redirect) => {
            auth.save().await?;
            add_breadcrumb("auth", "Signed up", Some(&[("role", form.role.as_str())]));
            Ok(Redirect::to(redirect.path()).into_response())
        }
        Err(e) => {
            // The manager recorded auth failures itself; clear it so the
            // message is shown once.
            auth.take_error();
            auth.save().await?;
            if let SignupError::Auth(inner) = &e {
                tracing::info!(error = %inner, "Signup failed");
            }
            Ok(SignupTemplate {
                user: auth.user(),
                error: Some(e.user_message()),
                name: form.name.clone(),
                email: form.email.clone(),
                admin_requested: form.role == Role::Admin,
            }
            .into_response())
        }
    }
}

/// Display the post-signup notice.
///
/// Carries the "account created but session failed" message when signup
/// could not sign the new account in.
pub async fn verify_email(CurrentUser { user, mut auth }: CurrentUser) -> Result<Response> {
    let error = auth.take_error();
    auth.save().await?;
    Ok(VerifyEmailTemplate { user, error }.into_response())
}

// =============================================================================
// Logout
// =============================================================================

/// Handle logout.
///
/// Always ends signed out on the login page, whatever the platform says.
pub async fn logout(mut auth: Auth) -> Result<Response> {
    let redirect = auth.manager().logout().await;
    auth.save().await?;
    add_breadcrumb("auth", "Logged out", None);
    Ok(Redirect::to(redirect.path()).into_response())
}

// =============================================================================
// Password Recovery
// =============================================================================

/// Display the forgot password page.
pub async fn forgot_password_page(CurrentUser { user, .. }: CurrentUser) -> impl IntoResponse {
    ForgotPasswordTemplate {
        user,
        error: None,
        success: None,
    }
}

/// Send a password recovery email.
pub async fn forgot_password(
    mut auth: Auth,
    Form(form): Form<ForgotPasswordForm>,
) -> Result<Response> {
    let result = auth.manager().reset_password(&form.email).await;
    let error = auth.take_error();
    auth.save().await?;

    let page = match result {
        Ok(()) => ForgotPasswordTemplate {
            user: auth.user(),
            error: None,
            success: Some("Password recovery email sent. Check your inbox.".to_string()),
        },
        Err(e) => {
            tracing::info!(error = %e, "Password recovery failed");
            ForgotPasswordTemplate {
                user: auth.user(),
                error: error.or_else(|| Some(e.user_message())),
                success: None,
            }
        }
    };
    Ok(page.into_response())
}

// =============================================================================
// Google OAuth
// =============================================================================

/// Start a Google sign-in.
pub async fn google(auth: Auth) -> Result<Redirect> {
    let url = auth.manager().login_with_google()?;
    Ok(Redirect::to(url.as_str()))
}

/// Start a Google sign-up, asking for profile and email access.
pub async fn google_signup(auth: Auth) -> Result<Redirect> {
    let url = auth.manager().login_with_google_on_signup()?;
    Ok(Redirect::to(url.as_str()))
}

/// Finish the OAuth flow with the one-time token the platform handed back.
///
/// A rejected token leaves its message on the login page.
pub async fn oauth_callback(
    mut auth: Auth,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<Redirect> {
    let (Some(user_id), Some(secret)) = (query.user_id, query.secret) else {
        return Err(AppError::BadRequest(
            "Missing sign-in token. Please try again.".to_string(),
        ));
    };

    let result = auth
        .manager()
        .complete_oauth(&UserId::new(user_id), &SecretString::from(secret))
        .await;
    auth.save().await?;

    match result {
        Ok(redirect) => {
            add_breadcrumb("auth", "Logged in with Google", None);
            Ok(Redirect::to(redirect.path()))
        }
        Err(e) => {
            tracing::warn!(error = %e, "OAuth completion failed");
            Ok(Redirect::to("/auth/login"))
        }
    }
}
