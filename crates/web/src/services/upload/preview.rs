//! Local previews of selected files.
//!
//! Each accepted file gets a [`PreviewHandle`]; the bytes stay servable until
//! the handle is dropped. Dropping is the only way to release a preview, so
//! every preview is released exactly once.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::body::Bytes;
use uuid::Uuid;

/// Identifier of a live preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreviewId(Uuid);

impl fmt::Display for PreviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for PreviewId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Bytes behind a preview.
#[derive(Debug, Clone)]
pub struct PreviewData {
    pub content_type: String,
    pub bytes: Bytes,
}

/// Registry of live previews, shared by every upload form.
#[derive(Clone, Default)]
pub struct PreviewRegistry {
    entries: Arc<Mutex<HashMap<PreviewId, PreviewData>>>,
}

impl PreviewRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PreviewId, PreviewData>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a preview; it lives as long as the returned handle.
    #[must_use]
    pub fn issue(&self, content_type: &str, bytes: Bytes) -> PreviewHandle {
        let id = PreviewId(Uuid::new_v4());
        self.entries().insert(
            id,
            PreviewData {
                content_type: content_type.to_string(),
                bytes,
            },
        );
        PreviewHandle {
            id,
            registry: self.clone(),
        }
    }

    /// Look up a live preview.
    #[must_use]
    pub fn get(&self, id: PreviewId) -> Option<PreviewData> {
        self.entries().get(&id).cloned()
    }

    /// Number of previews not yet released.
    #[must_use]
    pub fn live(&self) -> usize {
        self.entries().len()
    }

    fn release(&self, id: PreviewId) {
        if self.entries().remove(&id).is_none() {
            tracing::warn!(preview = %id, "Preview released twice");
        }
    }
}

/// Owner of one preview. Dropping it releases the preview.
pub struct PreviewHandle {
    id: PreviewId,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    #[must_use]
    pub const fn id(&self) -> PreviewId {
        self.id
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PreviewHandle").field(&self.id).finish()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_releases_on_drop() {
        let registry = PreviewRegistry::new();
        let handle = registry.issue("image/png", Bytes::from_static(b"png"));
        let id = handle.id();
        assert_eq!(registry.live(), 1);
        assert_eq!(registry.get(id).unwrap().content_type, "image/png");

        drop(handle);
        assert_eq!(registry.live(), 0);
        assert!(registry.get(id).is_none());
    }

    #[test]
    fn test_preview_id_round_trips_through_url() {
        let registry = PreviewRegistry::new();
        let handle = registry.issue("image/jpeg", Bytes::new());
        let parsed: PreviewId = handle.id().to_string().parse().unwrap();
        assert_eq!(parsed, handle.id());
        assert!("not-a-preview".parse::<PreviewId>().is_err());
    }
}
