//! Gallery listing and category filtering.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;
use url::Url;

use picture_gallery_core::{
    BucketId, CategoryFilter, CollectionId, DatabaseId, FileId, ImageDocument,
};

use crate::config::{DEFAULT_CATEGORY, PlatformConfig};
use crate::platform::{Document, Platform, PlatformError, Query, SessionSecret};

/// Errors loading the gallery.
///
/// Only the document listing can fail the page; per-image problems drop the
/// image instead.
#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("Failed to load images")]
    Listing(#[from] PlatformError),
}

/// An image ready to render.
#[derive(Debug, Clone)]
pub struct GalleryImage {
    pub document: ImageDocument,
    pub url: Url,
}

impl GalleryImage {
    #[must_use]
    pub fn category(&self) -> &str {
        &self.document.category
    }
}

/// Reads image documents and resolves their display URLs.
#[derive(Clone)]
pub struct GalleryService {
    platform: Arc<dyn Platform>,
    database: DatabaseId,
    collection: CollectionId,
    bucket: BucketId,
}

impl GalleryService {
    #[must_use]
    pub fn new(platform: Arc<dyn Platform>, config: &PlatformConfig) -> Self {
        Self {
            platform,
            database: config.database_id.clone(),
            collection: config.image_collection_id.clone(),
            bucket: config.image_bucket_id.clone(),
        }
    }

    /// Load every image, most recent first.
    ///
    /// Documents without a file reference, and files whose URL cannot be
    /// resolved, are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `GalleryError::Listing` if the documents cannot be listed.
    #[instrument(skip(self, session))]
    pub async fn fetch(
        &self,
        session: Option<&SessionSecret>,
    ) -> Result<Vec<GalleryImage>, GalleryError> {
        let documents = self
            .platform
            .list_documents(
                session,
                &self.database,
                &self.collection,
                &[Query::newest_first()],
            )
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to list image documents"))?;

        let total = documents.len();
        let images: Vec<GalleryImage> = documents
            .into_iter()
            .filter_map(|document| self.resolve(document))
            .collect();

        tracing::debug!(total, shown = images.len(), "Gallery loaded");
        Ok(images)
    }

    fn resolve(&self, document: Document) -> Option<GalleryImage> {
        let Some(image) = image_document(&document) else {
            tracing::warn!(document_id = %document.id, "Image document has no file reference");
            return None;
        };

        match self.platform.file_view_url(&self.bucket, &image.file_id) {
            Ok(url) => Some(GalleryImage {
                document: image,
                url,
            }),
            Err(e) => {
                tracing::warn!(
                    document_id = %image.id,
                    file_id = %image.file_id,
                    error = %e,
                    "Failed to resolve image URL"
                );
                None
            }
        }
    }
}

/// Read an [`ImageDocument`] out of a raw platform document.
///
/// Missing titles fall back to the file id, missing categories to the
/// default upload category, missing dates to the creation timestamp.
fn image_document(document: &Document) -> Option<ImageDocument> {
    let file_id = document.string("fileId").filter(|id| !id.is_empty())?;
    Some(ImageDocument {
        id: document.id.clone(),
        file_id: FileId::new(file_id),
        title: document
            .string("title")
            .unwrap_or(file_id)
            .to_string(),
        category: document
            .string("category")
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CATEGORY)
            .to_string(),
        date: document
            .string("date")
            .unwrap_or(&document.created_at)
            .to_string(),
    })
}

/// Loaded images plus the selected category.
///
/// Categories and the visible subset are derived on every call.
#[derive(Debug, Clone, Default)]
pub struct GalleryView {
    images: Vec<GalleryImage>,
    active: CategoryFilter,
}

impl GalleryView {
    #[must_use]
    pub const fn new(images: Vec<GalleryImage>, active: CategoryFilter) -> Self {
        Self { images, active }
    }

    /// Change the selected category.
    pub fn select(&mut self, filter: CategoryFilter) {
        self.active = filter;
    }

    #[must_use]
    pub const fn active(&self) -> &CategoryFilter {
        &self.active
    }

    #[must_use]
    pub fn images(&self) -> &[GalleryImage] {
        &self.images
    }

    /// `"All"` followed by each distinct category in first-seen order.
    #[must_use]
    pub fn categories(&self) -> Vec<String> {
        CategoryFilter::choices(self.images.iter().map(GalleryImage::category))
    }

    /// Images passing the selected category.
    #[must_use]
    pub fn visible(&self) -> Vec<&GalleryImage> {
        self.active.apply(&self.images, GalleryImage::category)
    }
}
