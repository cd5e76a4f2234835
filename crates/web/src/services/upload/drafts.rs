//! Upload working sets kept between requests.
//!
//! Each browser gets at most one draft, addressed by a random [`DraftId`]
//! stored in its session. Idle drafts expire; dropping the last reference
//! to an expired draft drops its form and so releases its previews.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use uuid::Uuid;

use picture_gallery_core::Progress;

use super::{PreviewRegistry, UploadForm};

/// Maximum number of drafts held at once.
const MAX_DRAFTS: u64 = 1_000;

/// Identifier of a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftId(Uuid);

impl DraftId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for DraftId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// One browser's upload form.
///
/// The progress receiver is readable while a submit holds the form lock.
pub struct Draft {
    form: Mutex<UploadForm>,
    progress: watch::Receiver<Progress>,
}

impl Draft {
    fn new(form: UploadForm) -> Self {
        let progress = form.subscribe();
        Self {
            form: Mutex::new(form),
            progress,
        }
    }

    /// Lock the form for reading or editing.
    pub async fn form(&self) -> tokio::sync::MutexGuard<'_, UploadForm> {
        self.form.lock().await
    }

    /// Progress of the current or last submit.
    #[must_use]
    pub fn progress(&self) -> Progress {
        *self.progress.borrow()
    }
}

/// Cache of drafts with idle expiry.
#[derive(Clone)]
pub struct DraftStore {
    cache: Cache<DraftId, Arc<Draft>>,
    previews: PreviewRegistry,
    category: String,
}

impl DraftStore {
    #[must_use]
    pub fn new(previews: PreviewRegistry, category: impl Into<String>, idle: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_DRAFTS)
            .time_to_idle(idle)
            .build();
        Self {
            cache,
            previews,
            category: category.into(),
        }
    }

    #[must_use]
    pub const fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    /// Look up an existing draft.
    pub async fn get(&self, id: DraftId) -> Option<Arc<Draft>> {
        self.cache.get(&id).await
    }

    /// Return the draft for `id`, creating a fresh one if it is missing or expired.
    pub async fn get_or_create(&self, id: Option<DraftId>) -> (DraftId, Arc<Draft>) {
        if let Some(id) = id
            && let Some(draft) = self.cache.get(&id).await
        {
            return (id, draft);
        }

        let id = DraftId::generate();
        let draft = Arc::new(Draft::new(UploadForm::new(
            self.previews.clone(),
            self.category.clone(),
        )));
        self.cache.insert(id, Arc::clone(&draft)).await;
        tracing::debug!(draft = %id, "Upload draft created");
        (id, draft)
    }

    /// Drop a draft.
    pub async fn discard(&self, id: DraftId) {
        self.cache.invalidate(&id).await;
    }

    /// Number of drafts after pending evictions have run.
    pub async fn draft_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}
