//! Integration tests for Picture Gallery.
//!
//! Each test spawns the full application on an ephemeral port, backed by an
//! in-memory platform the test keeps a handle to for seeding and inspection.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p picture-gallery-integration-tests
//! ```

use std::path::PathBuf;

use picture_gallery_core::{BucketId, CollectionId, DatabaseId, DocumentId, TeamId, UserId};
use picture_gallery_web::platform::MemoryPlatform;
use picture_gallery_web::{AppState, GalleryConfig};
use reqwest::{Client, Response, redirect};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use url::Url;

/// Password given to seeded accounts.
pub const PASSWORD: &str = "correct-horse-battery";

/// A running gallery and a handle to its platform.
pub struct TestApp {
    pub base_url: Url,
    pub platform: MemoryPlatform,
    pub config: GalleryConfig,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestApp {
    /// Start the gallery with rate limiting off.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Start the gallery after adjusting its configuration.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound or the state cannot be built.
    pub async fn spawn_with(configure: impl FnOnce(&mut GalleryConfig)) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Listener has no address");
        let base_url = Url::parse(&format!("http://{addr}/")).expect("Invalid base URL");

        let mut config = GalleryConfig::memory(base_url.clone());
        config.rate_limit = false;
        config.static_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../web/static");
        configure(&mut config);

        let platform = MemoryPlatform::new(
            config.platform.endpoint.clone(),
            config.platform.project_id.clone(),
        );
        platform.add_team(&config.platform.admin_team_id, "Admins");

        let state = AppState::with_memory(config.clone(), platform.clone())
            .expect("Failed to build application state");
        let app = picture_gallery_web::app(state);

        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let shutdown = async {
                let _ = rx.await;
            };
            let _ = picture_gallery_web::serve(listener, app, shutdown).await;
        });

        Self {
            base_url,
            platform,
            config,
            shutdown: Some(tx),
        }
    }

    /// Absolute URL of `path`.
    ///
    /// # Panics
    ///
    /// Panics if `path` does not join onto the base URL.
    #[must_use]
    pub fn url(&self, path: &str) -> Url {
        self.base_url.join(path).expect("Invalid test path")
    }

    /// A browser: keeps cookies, does not follow redirects.
    ///
    /// # Panics
    ///
    /// Panics if the client cannot be built.
    #[must_use]
    pub fn browser() -> Client {
        Client::builder()
            .cookie_store(true)
            .redirect(redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client")
    }

    pub fn admin_team(&self) -> &TeamId {
        &self.config.platform.admin_team_id
    }

    pub fn database(&self) -> &DatabaseId {
        &self.config.platform.database_id
    }

    pub fn collection(&self) -> &CollectionId {
        &self.config.platform.image_collection_id
    }

    pub fn bucket(&self) -> &BucketId {
        &self.config.platform.image_bucket_id
    }

    /// Seed a regular account.
    pub fn add_user(&self, email: &str) -> UserId {
        self.platform.add_account(email, PASSWORD, "Test User")
    }

    /// Seed an account with a confirmed admin-team membership.
    pub fn add_admin(&self, email: &str) -> UserId {
        let id = self.platform.add_account(email, PASSWORD, "Test Admin");
        self.platform.add_membership(self.admin_team(), &id, true);
        id
    }

    /// Seed an image document.
    pub fn add_image(&self, title: &str, category: &str, created_at: &str) -> DocumentId {
        self.platform.add_document(
            self.database(),
            self.collection(),
            created_at,
            serde_json::json!({
                "fileId": format!("file-{title}"),
                "title": title,
                "category": category,
                "date": created_at,
            }),
        )
    }

    /// Number of image documents.
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.platform
            .document_count(self.database(), self.collection())
    }

    /// Number of stored blobs.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.platform.file_count(self.bucket())
    }

    /// Post the login form.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn login(&self, browser: &Client, email: &str, password: &str) -> Response {
        browser
            .post(self.url("/auth/login"))
            .form(&[("email", email), ("password", password)])
            .send()
            .await
            .expect("Failed to post login")
    }

    /// GET `path`.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn get(&self, browser: &Client, path: &str) -> Response {
        browser
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send request")
    }

    /// POST to `path` without a body.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn post(&self, browser: &Client, path: &str) -> Response {
        browser
            .post(self.url(path))
            .send()
            .await
            .expect("Failed to send request")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// The `Location` header of a redirect.
///
/// # Panics
///
/// Panics if the response is not a redirect.
#[must_use]
pub fn location(response: &Response) -> String {
    assert!(
        response.status().is_redirection(),
        "expected a redirect, got {}",
        response.status()
    );
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("Redirect without Location")
        .to_string()
}
