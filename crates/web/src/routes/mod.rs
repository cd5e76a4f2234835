//! HTTP route handlers for the gallery.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page
//!
//! # Auth
//! GET  /auth/login             - Login page
//! POST /auth/login             - Login action (rate limited)
//! GET  /auth/signup            - Signup page
//! POST /auth/signup            - Signup action (rate limited)
//! POST /auth/logout            - Logout action
//! GET  /auth/forgot-password   - Password recovery page
//! POST /auth/forgot-password   - Send recovery email (rate limited)
//! GET  /auth/google            - Start Google sign-in
//! GET  /auth/google/signup     - Start Google sign-up (profile + email scopes)
//! GET  /auth/oauth/callback    - Finish OAuth with the one-time token
//! GET  /verify-email           - Post-signup notice
//!
//! # Account (requires auth)
//! GET  /account                - Profile
//! POST /account                - Update display name
//!
//! # Pictures
//! GET  /pictures?category=...  - Gallery with category filter
//!
//! # Upload (requires admin)
//! GET  /pictures/upload                - Upload form
//! POST /pictures/upload                - Submit the batch
//! POST /pictures/upload/files          - Add files (multipart)
//! POST /pictures/upload/remove/{index} - Remove a file
//! GET  /pictures/upload/preview/{id}   - Preview bytes of a selected file
//! GET  /pictures/upload/progress       - Batch progress (JSON)
//!
//! # Admin (requires admin)
//! GET  /admin/dashboard        - Admin landing page
//!
//! # Memory backend only
//! GET  /storage/buckets/{bucket}/files/{file}/view - Stored image bytes
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod home;
pub mod pictures;
pub mod storage;
pub mod upload;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Largest multipart body accepted when adding files.
const UPLOAD_BODY_LIMIT: usize = 50 * 1024 * 1024;

/// Create the auth routes router.
///
/// Form posts that send caller credentials to the platform share one
/// rate limit when `rate_limit` is set.
pub fn auth_routes(rate_limit: bool) -> Router<AppState> {
    let credential_posts = Router::new()
        .route("/login", post(auth::login))
        .route("/signup", post(auth::signup))
        .route("/forgot-password", post(auth::forgot_password));
    let credential_posts = if rate_limit {
        credential_posts.layer(auth_rate_limiter())
    } else {
        credential_posts
    };

    Router::new()
        .route("/login", get(auth::login_page))
        .route("/signup", get(auth::signup_page))
        .route("/forgot-password", get(auth::forgot_password_page))
        .route("/logout", post(auth::logout))
        .route("/google", get(auth::google))
        .route("/google/signup", get(auth::google_signup))
        .route("/oauth/callback", get(auth::oauth_callback))
        .merge(credential_posts)
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new().route("/", get(account::index).post(account::update))
}

/// Create the picture routes router.
pub fn picture_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(pictures::index))
        .route("/upload", get(upload::form).post(upload::submit))
        .route(
            "/upload/files",
            post(upload::add_files).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/upload/remove/{index}", post(upload::remove))
        .route("/upload/preview/{id}", get(upload::preview))
        .route("/upload/progress", get(upload::progress))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/dashboard", get(admin::dashboard))
}

/// Create all routes for the gallery.
pub fn routes(rate_limit: bool) -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/verify-email", get(auth::verify_email))
        .nest("/auth", auth_routes(rate_limit))
        .nest("/account", account_routes())
        .nest("/pictures", picture_routes())
        .nest("/admin", admin_routes())
        .route(
            "/storage/buckets/{bucket}/files/{file}/view",
            get(storage::view),
        )
}
