//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use axum::http::header::InvalidHeaderValue;

use crate::config::{GalleryConfig, PlatformBackend};
use crate::middleware::security_headers::content_security_policy;
use crate::platform::{AppwriteClient, MemoryPlatform, Platform, PlatformError};
use crate::services::upload::PreviewRegistry;
use crate::services::{
    AuthManager, AuthSettings, AuthState, DraftStore, GalleryService, UploadService,
};

/// Upload drafts untouched for this long are dropped.
const DRAFT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Team name given to the admin team of a fresh memory platform.
const MEMORY_ADMIN_TEAM_NAME: &str = "Admins";

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("platform client: {0}")]
    Platform(#[from] PlatformError),
    #[error("content security policy: {0}")]
    Csp(#[from] InvalidHeaderValue),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the platform, the services built on it and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: GalleryConfig,
    platform: Arc<dyn Platform>,
    memory: Option<MemoryPlatform>,
    gallery: GalleryService,
    upload: UploadService,
    drafts: DraftStore,
    auth: AuthSettings,
    csp: HeaderValue,
}

impl AppState {
    /// Create the state for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform client cannot be built.
    pub fn new(config: GalleryConfig) -> Result<Self, StateError> {
        match config.platform.backend {
            PlatformBackend::Appwrite => {
                let client = AppwriteClient::new(&config.platform)?;
                Self::build(config, Arc::new(client), None)
            }
            PlatformBackend::Memory => {
                let platform = MemoryPlatform::new(
                    config.platform.endpoint.clone(),
                    config.platform.project_id.clone(),
                );
                platform.add_team(&config.platform.admin_team_id, MEMORY_ADMIN_TEAM_NAME);
                Self::with_memory(config, platform)
            }
        }
    }

    /// Create the state around an existing memory platform.
    ///
    /// Tests keep their own handle to `platform` to seed and inspect it.
    ///
    /// # Errors
    ///
    /// Returns an error if the security policy cannot be built.
    pub fn with_memory(config: GalleryConfig, platform: MemoryPlatform) -> Result<Self, StateError> {
        Self::build(config, Arc::new(platform.clone()), Some(platform))
    }

    fn build(
        config: GalleryConfig,
        platform: Arc<dyn Platform>,
        memory: Option<MemoryPlatform>,
    ) -> Result<Self, StateError> {
        let csp = HeaderValue::from_str(&content_security_policy(&config.platform.endpoint))?;
        let gallery = GalleryService::new(Arc::clone(&platform), &config.platform);
        let upload = UploadService::new(Arc::clone(&platform), &config.platform);
        let drafts = DraftStore::new(
            PreviewRegistry::new(),
            config.default_category.clone(),
            DRAFT_IDLE_TIMEOUT,
        );
        let auth = AuthSettings {
            base_url: config.base_url.clone(),
            admin_team: config.platform.admin_team_id.clone(),
        };

        tracing::info!(backend = ?config.platform.backend, endpoint = %config.platform.endpoint, "Platform configured");

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                platform,
                memory,
                gallery,
                upload,
                drafts,
                auth,
                csp,
            }),
        })
    }

    /// Get a reference to the gallery configuration.
    #[must_use]
    pub fn config(&self) -> &GalleryConfig {
        &self.inner.config
    }

    /// Get a reference to the platform client.
    #[must_use]
    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.inner.platform
    }

    /// The memory platform, when that is the backend.
    #[must_use]
    pub fn memory(&self) -> Option<&MemoryPlatform> {
        self.inner.memory.as_ref()
    }

    #[must_use]
    pub fn gallery(&self) -> &GalleryService {
        &self.inner.gallery
    }

    #[must_use]
    pub fn upload(&self) -> &UploadService {
        &self.inner.upload
    }

    #[must_use]
    pub fn drafts(&self) -> &DraftStore {
        &self.inner.drafts
    }

    /// Content-Security-Policy header value.
    #[must_use]
    pub fn csp(&self) -> &HeaderValue {
        &self.inner.csp
    }

    /// Rebuild a browser's auth manager from its persisted state.
    #[must_use]
    pub fn auth_manager(&self, state: AuthState) -> AuthManager {
        AuthManager::restore(Arc::clone(&self.inner.platform), self.inner.auth.clone(), state)
    }
}
