//! Gallery route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use picture_gallery_core::CategoryFilter;

use crate::error::Result;
use crate::filters;
use crate::middleware::CurrentUser;
use crate::models::{SessionUser, take_flash};
use crate::services::{GalleryImage, GalleryView};
use crate::state::AppState;

/// Query parameters of the gallery page.
#[derive(Debug, Deserialize)]
pub struct GalleryQuery {
    pub category: Option<String>,
}

/// One category button.
#[derive(Clone)]
pub struct CategoryTab {
    pub label: String,
    pub href: String,
    pub active: bool,
}

/// Image display data for templates.
#[derive(Clone)]
pub struct ImageCard {
    pub title: String,
    pub category: String,
    pub date: String,
    pub url: String,
}

impl From<&GalleryImage> for ImageCard {
    fn from(image: &GalleryImage) -> Self {
        Self {
            title: image.document.title.clone(),
            category: image.document.category.clone(),
            date: image.document.date.clone(),
            url: image.url.to_string(),
        }
    }
}

/// Gallery page template.
#[derive(Template, WebTemplate)]
#[template(path = "pictures/index.html")]
pub struct PicturesTemplate {
    pub user: Option<SessionUser>,
    pub is_admin: bool,
    pub tabs: Vec<CategoryTab>,
    pub images: Vec<ImageCard>,
    pub active: String,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Link that selects `category`.
fn category_href(category: &str) -> String {
    if category == picture_gallery_core::ALL_CATEGORIES {
        "/pictures".to_string()
    } else {
        format!("/pictures?category={}", urlencoding::encode(category))
    }
}

/// Category buttons for `view`, marking the selected one.
fn category_tabs(view: &GalleryView) -> Vec<CategoryTab> {
    let active = view.active().label();
    view.categories()
        .into_iter()
        .map(|label| CategoryTab {
            href: category_href(&label),
            active: label == active,
            label,
        })
        .collect()
}

/// Display the gallery, newest first, filtered by `?category=`.
///
/// A listing failure renders the page with an error instead of images.
#[instrument(skip(state, user, auth))]
pub async fn index(
    State(state): State<AppState>,
    CurrentUser { user, auth }: CurrentUser,
    Query(query): Query<GalleryQuery>,
) -> Result<Response> {
    let flash = take_flash(auth.session()).await?;
    let filter = CategoryFilter::parse(query.category.as_deref());
    let session = auth.manager().snapshot().session;

    let (view, error) = match state.gallery().fetch(session.as_ref()).await {
        Ok(images) => (GalleryView::new(images, filter), None),
        Err(e) => (GalleryView::new(Vec::new(), filter), Some(e.to_string())),
    };

    Ok(PicturesTemplate {
        is_admin: user.as_ref().is_some_and(SessionUser::is_admin),
        user,
        tabs: category_tabs(&view),
        images: view.visible().into_iter().map(ImageCard::from).collect(),
        active: view.active().label().to_string(),
        error: error.or_else(|| flash.errors.into_iter().next()),
        success: flash.success,
    }
    .into_response())
}
