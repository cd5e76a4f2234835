//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::filters;
use crate::middleware::CurrentUser;
use crate::models::SessionUser;
use crate::routes::pictures::ImageCard;
use crate::state::AppState;

/// Number of recent images shown on the home page.
const RECENT_IMAGES: usize = 6;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub user: Option<SessionUser>,
    /// Latest uploads, newest first.
    pub recent: Vec<ImageCard>,
}

/// Display the home page.
///
/// The recent strip is best effort; a platform failure just hides it.
#[instrument(skip(state, user, auth))]
pub async fn home(
    State(state): State<AppState>,
    CurrentUser { user, auth }: CurrentUser,
) -> impl IntoResponse {
    let session = auth.manager().snapshot().session;
    let recent = state.gallery().fetch(session.as_ref()).await.map_or_else(
        |e| {
            tracing::error!("Failed to fetch recent images: {e}");
            Vec::new()
        },
        |images| images.iter().take(RECENT_IMAGES).map(ImageCard::from).collect(),
    );

    HomeTemplate { user, recent }
}
