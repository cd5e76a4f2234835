//! Admin dashboard.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};

use crate::filters;
use crate::middleware::RequireAdmin;
use crate::models::SessionUser;
use crate::state::AppState;

/// Dashboard page template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub user: Option<SessionUser>,
    pub admin: SessionUser,
    /// Number of images in the gallery, if it could be counted.
    pub image_count: Option<usize>,
    /// Files waiting in this browser's upload form.
    pub pending_uploads: usize,
}

/// Display the admin landing page.
pub async fn dashboard(
    State(state): State<AppState>,
    RequireAdmin { user, auth }: RequireAdmin,
) -> impl IntoResponse {
    let session = auth.manager().snapshot().session;
    let image_count = match state.gallery().fetch(session.as_ref()).await {
        Ok(images) => Some(images.len()),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to count images");
            None
        }
    };

    let pending_uploads = match super::upload::current_draft(&state, auth.session()).await {
        Ok(Some(draft)) => draft.form().await.len(),
        Ok(None) => 0,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read upload draft");
            0
        }
    };

    DashboardTemplate {
        user: Some(user.clone()),
        admin: user,
        image_count,
        pending_uploads,
    }
}
