//! Account route handlers.
//!
//! These routes require authentication.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::error::Result;
use crate::filters;
use crate::middleware::RequireUser;
use crate::models::{Flash, SessionUser, set_flash, take_flash};

/// Profile form data.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub name: String,
}

/// Account page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountTemplate {
    pub user: Option<SessionUser>,
    pub account: SessionUser,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Display the profile.
pub async fn index(RequireUser { user, auth }: RequireUser) -> Result<Response> {
    let flash = take_flash(auth.session()).await?;
    Ok(AccountTemplate {
        user: Some(user.clone()),
        account: user,
        error: flash.errors.into_iter().next(),
        success: flash.success,
    }
    .into_response())
}

/// Change the display name.
///
/// The role is re-derived as part of the update.
pub async fn update(
    RequireUser { user, mut auth }: RequireUser,
    Form(form): Form<ProfileForm>,
) -> Result<Response> {
    let result = auth.manager().update_profile(&form.name).await;
    let error = auth.take_error();
    auth.save().await?;

    match result {
        Ok(()) => {
            set_flash(auth.session(), &Flash::success("Profile updated")).await?;
            Ok(Redirect::to("/account").into_response())
        }
        Err(e) => {
            tracing::warn!(user_id = %user.id, error = %e, "Profile update failed");
            Ok(AccountTemplate {
                user: Some(user.clone()),
                account: user,
                error: error.or_else(|| Some(e.user_message())),
                success: None,
            }
            .into_response())
        }
    }
}
