//! Session-related types.
//!
//! Everything the gallery keeps per browser lives in the server-side session
//! under one of these keys.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

/// Session keys.
pub mod keys {
    /// Key for the persisted `AuthState` (user, platform session secret, last error).
    pub const AUTH_STATE: &str = "auth_state";

    /// Key for the upload draft identifier.
    pub const UPLOAD_DRAFT: &str = "upload_draft";

    /// Key for a one-shot notice shown on the next rendered page.
    pub const FLASH: &str = "flash";
}

/// One-shot notice carried across a redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub success: Option<String>,
    pub errors: Vec<String>,
}

impl Flash {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: Some(message.into()),
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub const fn errors(errors: Vec<String>) -> Self {
        Self {
            success: None,
            errors,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.success.is_none() && self.errors.is_empty()
    }
}

/// Store a notice for the next page. Empty notices are not stored.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_flash(session: &Session, flash: &Flash) -> Result<(), tower_sessions::session::Error> {
    if flash.is_empty() {
        return Ok(());
    }
    session.insert(keys::FLASH, flash).await
}

/// Remove and return the pending notice.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn take_flash(session: &Session) -> Result<Flash, tower_sessions::session::Error> {
    Ok(session
        .remove::<Flash>(keys::FLASH)
        .await?
        .unwrap_or_default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn test_flash_is_taken_once() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);

        set_flash(&session, &Flash::success("Uploaded 2 images"))
            .await
            .unwrap();

        let flash = take_flash(&session).await.unwrap();
        assert_eq!(flash.success.as_deref(), Some("Uploaded 2 images"));
        assert!(take_flash(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_flash_is_not_stored() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);

        set_flash(&session, &Flash::default()).await.unwrap();

        assert!(session.is_empty().await);
    }
}
