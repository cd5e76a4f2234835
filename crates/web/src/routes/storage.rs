//! Blob serving for the memory backend.
//!
//! With `GALLERY_PLATFORM=memory` the platform endpoint is the gallery itself,
//! so file view URLs land here. Any other backend answers 404.

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};

use picture_gallery_core::{BucketId, FileId};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Serve a stored file.
pub async fn view(
    State(state): State<AppState>,
    Path((bucket, file)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    let memory = state
        .memory()
        .ok_or_else(|| AppError::NotFound("File".to_string()))?;
    let blob = memory
        .file(&BucketId::new(bucket), &FileId::new(file))
        .ok_or_else(|| AppError::NotFound("File".to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, blob.content_type),
            (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
        ],
        blob.bytes,
    ))
}
