//! Upload route handlers (admin only).
//!
//! The working set lives in the browser's draft between requests. Adding,
//! removing and submitting all redirect back to a page, carrying messages in
//! the session flash.

use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;
use tower_sessions::Session;

use picture_gallery_core::Progress;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::models::{Flash, SessionUser, session_keys, set_flash, take_flash};
use crate::services::upload::{Draft, DraftId, FileOutcome, PreviewId};
use crate::services::{IncomingFile, UploadError};
use crate::state::AppState;

/// Path of the upload form.
const UPLOAD_PATH: &str = "/pictures/upload";

/// Content type assumed for parts that do not declare one.
const UNKNOWN_CONTENT_TYPE: &str = "application/octet-stream";

/// The browser's existing draft, if any.
///
/// # Errors
///
/// Returns `AppError::Session` if the session cannot be read.
pub async fn current_draft(state: &AppState, session: &Session) -> Result<Option<Arc<Draft>>> {
    let Some(id) = session.get::<DraftId>(session_keys::UPLOAD_DRAFT).await? else {
        return Ok(None);
    };
    Ok(state.drafts().get(id).await)
}

/// The browser's draft, created (and remembered) if missing or expired.
async fn draft(state: &AppState, session: &Session) -> Result<Arc<Draft>> {
    let stored = session.get::<DraftId>(session_keys::UPLOAD_DRAFT).await?;
    let (id, draft) = state.drafts().get_or_create(stored).await;
    if stored != Some(id) {
        session.insert(session_keys::UPLOAD_DRAFT, id).await?;
    }
    Ok(draft)
}

/// Selected file display data for templates.
pub struct FileView {
    pub index: usize,
    pub name: String,
    pub size: usize,
    pub preview_url: String,
}

/// Progress as served to the page script.
#[derive(Debug, Serialize)]
pub struct ProgressView {
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
}

impl From<Progress> for ProgressView {
    fn from(progress: Progress) -> Self {
        Self {
            completed: progress.completed(),
            total: progress.total(),
            percent: progress.rounded_percent(),
        }
    }
}

/// Upload page template.
#[derive(Template, WebTemplate)]
#[template(path = "pictures/upload.html")]
pub struct UploadTemplate {
    pub user: Option<SessionUser>,
    pub files: Vec<FileView>,
    pub category: String,
    pub progress: ProgressView,
    pub errors: Vec<String>,
    pub success: Option<String>,
}

/// Display the upload form.
pub async fn form(
    State(state): State<AppState>,
    RequireAdmin { user, auth }: RequireAdmin,
) -> Result<Response> {
    let flash = take_flash(auth.session()).await?;
    let draft = draft(&state, auth.session()).await?;
    let form = draft.form().await;

    let files = form
        .files()
        .iter()
        .enumerate()
        .map(|(index, file)| FileView {
            index,
            name: file.name.clone(),
            size: file.size(),
            preview_url: format!("{UPLOAD_PATH}/preview/{}", file.preview_id()),
        })
        .collect();

    Ok(UploadTemplate {
        user: Some(user),
        files,
        category: form.category().to_string(),
        progress: draft.progress().into(),
        errors: flash.errors,
        success: flash.success,
    }
    .into_response())
}

/// Add the posted files to the working set.
///
/// Every part with a file name counts, whatever its field name, so the
/// picker and drag-and-drop post the same way. Parts without a file name
/// (an empty picker) are ignored.
pub async fn add_files(
    State(state): State<AppState>,
    RequireAdmin { auth, .. }: RequireAdmin,
    mut multipart: Multipart,
) -> Result<Redirect> {
    let mut incoming = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {e}")))?
    {
        let Some(name) = field.file_name().filter(|n| !n.is_empty()).map(String::from) else {
            continue;
        };
        let content_type = field
            .content_type()
            .unwrap_or(UNKNOWN_CONTENT_TYPE)
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid upload: {e}")))?;
        incoming.push(IncomingFile {
            name,
            content_type,
            bytes,
        });
    }

    let draft = draft(&state, auth.session()).await?;
    let received = incoming.len();
    let rejected = draft.form().await.add_files(incoming);
    tracing::debug!(received, rejected = rejected.len(), "Files added to upload draft");

    set_flash(auth.session(), &Flash::errors(rejected)).await?;
    Ok(Redirect::to(UPLOAD_PATH))
}

/// Remove one file from the working set.
pub async fn remove(
    State(state): State<AppState>,
    RequireAdmin { auth, .. }: RequireAdmin,
    Path(index): Path<usize>,
) -> Result<Redirect> {
    let draft = current_draft(&state, auth.session())
        .await?
        .ok_or_else(|| AppError::NotFound("Upload".to_string()))?;
    if !draft.form().await.remove(index) {
        return Err(AppError::NotFound(format!("File {index}")));
    }
    Ok(Redirect::to(UPLOAD_PATH))
}

/// Serve the preview of a selected file.
pub async fn preview(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<String>,
) -> Result<Response> {
    let id: PreviewId = id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid preview id".to_string()))?;
    let preview = state
        .drafts()
        .previews()
        .get(id)
        .ok_or_else(|| AppError::NotFound("Preview".to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, preview.content_type),
            (header::CACHE_CONTROL, "private, max-age=300".to_string()),
        ],
        preview.bytes,
    )
        .into_response())
}

/// Progress of the current or last batch.
pub async fn progress(
    State(state): State<AppState>,
    RequireAdmin { auth, .. }: RequireAdmin,
) -> Result<Json<ProgressView>> {
    let progress = current_draft(&state, auth.session())
        .await?
        .map(|draft| draft.progress())
        .unwrap_or_default();
    Ok(Json(progress.into()))
}

/// Upload the working set.
///
/// Success goes to the gallery; any failure returns to the form with the
/// batch message and one line per failed file.
pub async fn submit(
    State(state): State<AppState>,
    RequireAdmin { user, auth }: RequireAdmin,
) -> Result<Redirect> {
    let draft = draft(&state, auth.session()).await?;
    let session = auth.manager().snapshot().session;

    let result = {
        let mut form = draft.form().await;
        form.submit(state.upload(), session.as_ref()).await
    };

    match result {
        Ok(count) => {
            let count_text = count.to_string();
            add_breadcrumb("upload", "Images uploaded", Some(&[("count", count_text.as_str())]));
            tracing::info!(user_id = %user.id, count, "Upload batch stored");
            let noun = if count == 1 { "image" } else { "images" };
            set_flash(
                auth.session(),
                &Flash::success(format!("Uploaded {count} {noun}")),
            )
            .await?;
            Ok(Redirect::to("/pictures"))
        }
        Err(e) => {
            set_flash(auth.session(), &Flash::errors(failure_messages(&e))).await?;
            Ok(Redirect::to(UPLOAD_PATH))
        }
    }
}

/// Batch message followed by one line per failed file.
fn failure_messages(error: &UploadError) -> Vec<String> {
    let mut messages = vec![error.to_string()];
    if let UploadError::Failed { outcomes } = error {
        messages.extend(outcomes.iter().filter_map(|outcome| match outcome {
            FileOutcome::Failed { name, reason } => Some(format!("{name}: {reason}")),
            FileOutcome::Uploaded { .. } => None,
        }));
    }
    messages
}
