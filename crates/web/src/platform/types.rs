//! Platform wire types.
//!
//! Field names follow the platform's JSON (`$id`, `userId`, ...). These are
//! transport shapes; services convert them into domain types.

use std::fmt;

use axum::body::Bytes;
use serde::{Deserialize, Serialize};

use picture_gallery_core::{DocumentId, Email, FileId, MembershipId, TeamId, UserId};

// =============================================================================
// Sessions & accounts
// =============================================================================

/// Secret that authenticates requests on behalf of a user.
///
/// Stored in the server-side browser session; never rendered or logged.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionSecret(String);

impl SessionSecret {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Reveal the secret for use in a request header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionSecret([REDACTED])")
    }
}

/// A platform session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(rename = "$id")]
    pub id: String,
    pub user_id: UserId,
    /// Empty unless the session was created with server credentials.
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub expire: String,
    #[serde(default)]
    pub current: bool,
}

impl Session {
    /// The secret as a [`SessionSecret`], if the platform returned one.
    #[must_use]
    pub fn session_secret(&self) -> Option<SessionSecret> {
        (!self.secret.is_empty()).then(|| SessionSecret::new(self.secret.clone()))
    }
}

/// A platform account (the native user record; it carries no role).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(rename = "$id")]
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub email_verification: bool,
}

/// Request body for account registration.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user_id: UserId,
    pub email: Email,
    pub password: secrecy::SecretString,
    pub name: String,
}

// =============================================================================
// OAuth
// =============================================================================

/// OAuth identity providers offered on the login and signup pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
}

impl OAuthProvider {
    /// Provider key in platform URLs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
        }
    }
}

/// Parameters for starting an OAuth flow.
#[derive(Debug, Clone)]
pub struct OAuthRequest {
    pub provider: OAuthProvider,
    /// Where the platform sends the browser after consent.
    pub success: url::Url,
    /// Where the platform sends the browser if consent fails.
    pub failure: url::Url,
    pub scopes: Vec<String>,
}

// =============================================================================
// Teams
// =============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Team {
    #[serde(rename = "$id")]
    pub id: TeamId,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    #[serde(rename = "$id")]
    pub id: MembershipId,
    pub user_id: UserId,
    pub team_id: TeamId,
    #[serde(default)]
    pub roles: Vec<String>,
    /// True once the invitation has been accepted.
    #[serde(default)]
    pub confirm: bool,
}

/// Request body for team membership creation.
#[derive(Debug, Clone)]
pub struct NewMembership {
    pub team_id: TeamId,
    pub user_id: UserId,
    pub roles: Vec<String>,
    /// Invitation acceptance link.
    pub url: url::Url,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TeamList {
    pub teams: Vec<Team>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MembershipList {
    pub memberships: Vec<Membership>,
}

// =============================================================================
// Documents
// =============================================================================

/// A database document: system fields plus free-form attributes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Document {
    #[serde(rename = "$id")]
    pub id: DocumentId,
    #[serde(rename = "$createdAt", default)]
    pub created_at: String,
    #[serde(flatten)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    /// Read a string attribute; missing, null and non-string values are `None`.
    #[must_use]
    pub fn string(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(serde_json::Value::as_str)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocumentList {
    pub documents: Vec<Document>,
}

/// Document list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    OrderDesc(String),
    OrderAsc(String),
    Limit(u32),
}

impl Query {
    /// Newest documents first.
    #[must_use]
    pub fn newest_first() -> Self {
        Self::OrderDesc("$createdAt".to_string())
    }

    /// JSON encoding used in the `queries[]` URL parameter.
    #[must_use]
    pub fn to_wire(&self) -> String {
        let value = match self {
            Self::OrderDesc(attribute) => {
                serde_json::json!({ "method": "orderDesc", "attribute": attribute })
            }
            Self::OrderAsc(attribute) => {
                serde_json::json!({ "method": "orderAsc", "attribute": attribute })
            }
            Self::Limit(limit) => serde_json::json!({ "method": "limit", "values": [limit] }),
        };
        value.to_string()
    }
}

// =============================================================================
// Storage
// =============================================================================

/// File bytes to upload.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Metadata of a stored file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    #[serde(rename = "$id")]
    pub id: FileId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub size_original: u64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_session_secret_debug_is_redacted() {
        let secret = SessionSecret::new("very-secret-value");
        let debug = format!("{secret:?}");
        assert!(!debug.contains("very-secret-value"));
        assert_eq!(secret.expose(), "very-secret-value");
    }

    #[test]
    fn test_document_flattens_attributes() {
        let json = r#"{
            "$id": "doc1",
            "$createdAt": "2024-05-01T10:00:00.000+00:00",
            "$collectionId": "images",
            "fileId": "file1",
            "title": "sunset.jpg",
            "category": null
        }"#;
        let doc: Document = serde_json::from_str(json).unwrap();
        assert_eq!(doc.id.as_str(), "doc1");
        assert_eq!(doc.string("fileId"), Some("file1"));
        assert_eq!(doc.string("category"), None);
        assert_eq!(doc.string("missing"), None);
    }

    #[test]
    fn test_membership_decodes() {
        let json = r#"{"$id":"m1","userId":"u1","teamId":"admins","roles":["owner"],"confirm":true}"#;
        let m: Membership = serde_json::from_str(json).unwrap();
        assert!(m.confirm);
        assert_eq!(m.team_id.as_str(), "admins");
    }

    #[test]
    fn test_query_wire_format() {
        let order: serde_json::Value =
            serde_json::from_str(&Query::newest_first().to_wire()).unwrap();
        assert_eq!(
            order,
            serde_json::json!({ "method": "orderDesc", "attribute": "$createdAt" })
        );
        let limit: serde_json::Value = serde_json::from_str(&Query::Limit(25).to_wire()).unwrap();
        assert_eq!(limit["values"][0], 25);
    }

    #[test]
    fn test_session_secret_absent() {
        let json = r#"{"$id":"s1","userId":"u1","secret":""}"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert!(session.session_secret().is_none());
    }
}
