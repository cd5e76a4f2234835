//! Image upload (admin only).
//!
//! # Flow
//!
//! 1. Files arrive (picker or drag-and-drop) and are added to an
//!    [`UploadForm`]; non-images are rejected by name
//! 2. Each accepted file holds a preview until it leaves the form
//! 3. [`UploadForm::submit`] uploads every file concurrently: blob first,
//!    then the metadata document, advancing a shared progress counter
//!
//! Between requests the form lives in a [`DraftStore`].

mod drafts;
mod preview;

pub use drafts::{Draft, DraftId, DraftStore};
pub use preview::{PreviewData, PreviewHandle, PreviewId, PreviewRegistry};

use std::sync::Arc;

use axum::body::Bytes;
use futures::future::join_all;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use picture_gallery_core::{
    BucketId, CollectionId, DatabaseId, DocumentId, FileId, Progress,
};

use crate::config::PlatformConfig;
use crate::platform::{FileUpload, Platform, PlatformError, SessionSecret, unique_id};

/// Errors from submitting an upload batch.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Please select at least one image")]
    NoFiles,

    /// At least one file failed; `outcomes` covers every file of the batch.
    #[error("Failed to upload images. Please try again.")]
    Failed { outcomes: Vec<FileOutcome> },
}

/// Result of uploading one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Uploaded { name: String, document: DocumentId },
    Failed { name: String, reason: String },
}

impl FileOutcome {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Uploaded { name, .. } | Self::Failed { name, .. } => name,
        }
    }

    #[must_use]
    pub const fn is_uploaded(&self) -> bool {
        matches!(self, Self::Uploaded { .. })
    }
}

/// A file as received from the browser.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl IncomingFile {
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// A file accepted into the working set.
#[derive(Debug)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
    preview: PreviewHandle,
}

impl SelectedFile {
    #[must_use]
    pub const fn preview_id(&self) -> PreviewId {
        self.preview.id()
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Writes image blobs and their metadata documents.
#[derive(Clone)]
pub struct UploadService {
    platform: Arc<dyn Platform>,
    database: DatabaseId,
    collection: CollectionId,
    bucket: BucketId,
}

impl UploadService {
    #[must_use]
    pub fn new(platform: Arc<dyn Platform>, config: &PlatformConfig) -> Self {
        Self {
            platform,
            database: config.database_id.clone(),
            collection: config.image_collection_id.clone(),
            bucket: config.image_bucket_id.clone(),
        }
    }

    /// Store one file, then its document. Returns the document id.
    #[instrument(skip_all, fields(file = %file.name, size = file.size()))]
    async fn upload_one(
        &self,
        session: Option<&SessionSecret>,
        file: &SelectedFile,
        category: &str,
    ) -> Result<DocumentId, PlatformError> {
        let file_id = FileId::new(unique_id());
        self.platform
            .create_file(
                session,
                &self.bucket,
                &file_id,
                FileUpload {
                    file_name: file.name.clone(),
                    content_type: file.content_type.clone(),
                    bytes: file.bytes.clone(),
                },
            )
            .await?;

        let document_id = DocumentId::new(unique_id());
        let data = serde_json::json!({
            "fileId": file_id.as_str(),
            "title": file.name,
            "category": category,
            "date": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        });
        self.platform
            .create_document(
                session,
                &self.database,
                &self.collection,
                &document_id,
                data,
            )
            .await?;
        Ok(document_id)
    }
}

/// The upload working set.
///
/// Dropping the form releases every preview it still holds and cancels its
/// token, after which progress updates are discarded.
pub struct UploadForm {
    files: Vec<SelectedFile>,
    previews: PreviewRegistry,
    category: String,
    limits: DraftLimits,
    progress: watch::Sender<Progress>,
    cancel: CancellationToken,
}

/// How much one form may hold before further files are turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftLimits {
    pub files: usize,
    pub bytes: usize,
}

impl Default for DraftLimits {
    fn default() -> Self {
        Self {
            files: 50,
            bytes: 200 * 1024 * 1024,
        }
    }
}

impl UploadForm {
    #[must_use]
    pub fn new(previews: PreviewRegistry, category: impl Into<String>) -> Self {
        let (progress, _) = watch::channel(Progress::default());
        Self {
            files: Vec::new(),
            previews,
            category: category.into(),
            limits: DraftLimits::default(),
            progress,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_limits(mut self, limits: DraftLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Current batch progress.
    #[must_use]
    pub fn progress(&self) -> Progress {
        *self.progress.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    /// Token cancelled when the form goes away.
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Add files to the working set.
    ///
    /// Returns one message per rejected file: non-images, and images that
    /// would take the form past its [`DraftLimits`].
    pub fn add_files(&mut self, files: impl IntoIterator<Item = IncomingFile>) -> Vec<String> {
        let mut rejected = Vec::new();
        let mut held: usize = self.files.iter().map(|f| f.bytes.len()).sum();
        for file in files {
            if !file.is_image() {
                tracing::debug!(file = %file.name, content_type = %file.content_type, "Rejected non-image file");
                rejected.push(format!("{} is not a valid image file", file.name));
                continue;
            }
            if self.files.len() >= self.limits.files {
                rejected.push(format!(
                    "{} was not added: at most {} images per upload",
                    file.name, self.limits.files
                ));
                continue;
            }
            if held.saturating_add(file.bytes.len()) > self.limits.bytes {
                rejected.push(format!(
                    "{} was not added: the upload would exceed {} MB",
                    file.name,
                    self.limits.bytes / (1024 * 1024)
                ));
                continue;
            }
            held += file.bytes.len();
            let preview = self.previews.issue(&file.content_type, file.bytes.clone());
            self.files.push(SelectedFile {
                name: file.name,
                content_type: file.content_type,
                bytes: file.bytes,
                preview,
            });
        }
        rejected
    }

    /// Remove the file at `index`, releasing its preview.
    ///
    /// Returns false if there is no such file.
    pub fn remove(&mut self, index: usize) -> bool {
        if index >= self.files.len() {
            return false;
        }
        self.files.remove(index);
        true
    }

    /// Upload every file concurrently and wait for all of them to settle.
    ///
    /// Files that were stored leave the working set even when others fail.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::NoFiles` for an empty working set (nothing is
    /// sent) and `UploadError::Failed` if any file failed.
    #[instrument(skip_all, fields(files = self.files.len()))]
    pub async fn submit(
        &mut self,
        service: &UploadService,
        session: Option<&SessionSecret>,
    ) -> Result<usize, UploadError> {
        if self.files.is_empty() {
            return Err(UploadError::NoFiles);
        }

        let total = self.files.len();
        self.publish(|_| Progress::new(total));

        let results = {
            let progress = &self.progress;
            let cancel = &self.cancel;
            let category = self.category.as_str();
            join_all(self.files.iter().map(|file| async move {
                let result = service.upload_one(session, file, category).await;
                if result.is_ok() && !cancel.is_cancelled() {
                    progress.send_modify(|p| *p = p.advance());
                }
                result
            }))
            .await
        };

        let mut outcomes = Vec::with_capacity(total);
        let mut uploaded = Vec::with_capacity(total);
        for (file, result) in self.files.iter().zip(results) {
            match result {
                Ok(document) => {
                    uploaded.push(true);
                    outcomes.push(FileOutcome::Uploaded {
                        name: file.name.clone(),
                        document,
                    });
                }
                Err(e) => {
                    tracing::error!(file = %file.name, error = %e, "Image upload failed");
                    uploaded.push(false);
                    outcomes.push(FileOutcome::Failed {
                        name: file.name.clone(),
                        reason: e.user_message(),
                    });
                }
            }
        }

        let mut stored = uploaded.iter();
        self.files.retain(|_| !stored.next().copied().unwrap_or(false));

        let succeeded = outcomes.iter().filter(|o| o.is_uploaded()).count();
        if succeeded == total {
            tracing::info!(count = total, category = %self.category, "Images uploaded");
            Ok(total)
        } else {
            tracing::warn!(succeeded, total, "Upload batch failed");
            Err(UploadError::Failed { outcomes })
        }
    }

    fn publish(&self, f: impl FnOnce(Progress) -> Progress) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.progress.send_modify(|p| *p = f(*p));
    }
}

impl Drop for UploadForm {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
