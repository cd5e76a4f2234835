//! Backend platform client.
//!
//! # Architecture
//!
//! - The platform (Appwrite-compatible) owns ALL persistent state: accounts,
//!   sessions, team memberships, image documents and image blobs
//! - No local database, no sync - every read and write is a direct API call
//! - [`Platform`] is the capability surface the services depend on; handlers
//!   never talk to a concrete client
//!
//! # Implementations
//!
//! - [`AppwriteClient`] - REST client over `reqwest` (production)
//! - [`MemoryPlatform`] - in-process platform with fault injection (local
//!   development and tests)
//!
//! # Sessions
//!
//! Account-scoped calls take the caller's [`SessionSecret`]. Calls that may
//! run anonymously (listing public documents) take `Option<&SessionSecret>`.

mod appwrite;
mod error;
pub mod memory;
pub mod types;

pub use appwrite::AppwriteClient;
pub use error::PlatformError;
pub use memory::MemoryPlatform;
pub use types::*;

use async_trait::async_trait;
use secrecy::SecretString;
use url::Url;

use picture_gallery_core::{
    BucketId, CollectionId, DatabaseId, DocumentId, Email, FileId, TeamId, UserId,
};

/// Capability surface of the hosted backend.
///
/// Every method maps to exactly one platform request; nothing here retries.
#[async_trait]
pub trait Platform: Send + Sync + 'static {
    // =========================================================================
    // Account & sessions
    // =========================================================================

    /// Create an email/password session and return its secret.
    async fn create_email_password_session(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Session, PlatformError>;

    /// Exchange a one-time OAuth token for a session.
    async fn create_session_from_token(
        &self,
        user_id: &UserId,
        secret: &SecretString,
    ) -> Result<Session, PlatformError>;

    /// Fetch the account that owns `session`.
    async fn get_account(&self, session: &SessionSecret) -> Result<Account, PlatformError>;

    /// Fetch the current session itself.
    async fn get_session(&self, session: &SessionSecret) -> Result<Session, PlatformError>;

    /// Delete the current session.
    async fn delete_session(&self, session: &SessionSecret) -> Result<(), PlatformError>;

    /// Register a new account.
    async fn create_account(&self, request: &NewAccount) -> Result<Account, PlatformError>;

    /// Change the display name of the session's account.
    async fn update_name(
        &self,
        session: &SessionSecret,
        name: &str,
    ) -> Result<Account, PlatformError>;

    /// Send a password-recovery email that links back to `redirect_url`.
    async fn create_recovery(&self, email: &Email, redirect_url: &Url)
    -> Result<(), PlatformError>;

    /// Build the URL that starts an OAuth flow with the given provider.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::InvalidRequest` if the URL cannot be built.
    fn oauth2_token_url(&self, request: &OAuthRequest) -> Result<Url, PlatformError>;

    // =========================================================================
    // Teams
    // =========================================================================

    /// List the teams visible to the session.
    async fn list_teams(&self, session: &SessionSecret) -> Result<Vec<Team>, PlatformError>;

    /// List memberships of `team` visible to the session.
    async fn list_memberships(
        &self,
        session: &SessionSecret,
        team: &TeamId,
    ) -> Result<Vec<Membership>, PlatformError>;

    /// Invite a user into a team.
    async fn create_membership(
        &self,
        session: Option<&SessionSecret>,
        request: &NewMembership,
    ) -> Result<Membership, PlatformError>;

    // =========================================================================
    // Documents
    // =========================================================================

    /// List documents of a collection.
    async fn list_documents(
        &self,
        session: Option<&SessionSecret>,
        database: &DatabaseId,
        collection: &CollectionId,
        queries: &[Query],
    ) -> Result<Vec<Document>, PlatformError>;

    /// Create a document with the given attributes.
    async fn create_document(
        &self,
        session: Option<&SessionSecret>,
        database: &DatabaseId,
        collection: &CollectionId,
        id: &DocumentId,
        data: serde_json::Value,
    ) -> Result<Document, PlatformError>;

    // =========================================================================
    // Storage
    // =========================================================================

    /// Upload a file into a bucket.
    async fn create_file(
        &self,
        session: Option<&SessionSecret>,
        bucket: &BucketId,
        id: &FileId,
        upload: FileUpload,
    ) -> Result<StoredFile, PlatformError>;

    /// Resolve a stored file to a URL a browser can display.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::InvalidRequest` if the URL cannot be built.
    fn file_view_url(&self, bucket: &BucketId, file: &FileId) -> Result<Url, PlatformError>;

    // =========================================================================
    // Health
    // =========================================================================

    /// Check that the platform is reachable.
    async fn health(&self) -> Result<(), PlatformError>;
}

/// Minimum password length the platform accepts.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Generate a new platform-unique ID.
///
/// The platform accepts client-chosen IDs of up to 36 characters; a simple
/// (hyphen-free) v4 UUID is 32.
#[must_use]
pub fn unique_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
