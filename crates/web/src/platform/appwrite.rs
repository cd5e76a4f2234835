//! Appwrite REST client.
//!
//! Speaks the platform's JSON REST API with `reqwest`. Every request carries
//! the project header; account-scoped requests also carry the caller's
//! session secret. The server API key, when configured, goes only on requests
//! made without a session: with both headers the platform acts as the
//! application rather than the user.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use picture_gallery_core::{
    BucketId, CollectionId, DatabaseId, DocumentId, Email, FileId, TeamId, UserId,
};

use super::types::{DocumentList, MembershipList, TeamList};
use super::{
    Account, Document, FileUpload, Membership, NewAccount, NewMembership, OAuthRequest, Platform,
    PlatformError, Query, Session, SessionSecret, StoredFile, Team,
};
use crate::config::PlatformConfig;

/// Response format the types in this module are written against.
const RESPONSE_FORMAT: &str = "1.5.0";

/// Header carrying the caller's session secret.
const SESSION_HEADER: &str = "X-Appwrite-Session";

/// Header carrying the server API key.
const KEY_HEADER: &str = "X-Appwrite-Key";

/// Error document returned by the platform.
#[derive(Debug, serde::Deserialize)]
struct ApiErrorBody {
    message: String,
    #[serde(rename = "type", default)]
    kind: String,
}

/// Client for an Appwrite-compatible platform.
#[derive(Clone)]
pub struct AppwriteClient {
    inner: Arc<AppwriteClientInner>,
}

struct AppwriteClientInner {
    client: reqwest::Client,
    endpoint: Url,
    project_id: String,
    api_key: Option<HeaderValue>,
}

impl AppwriteClient {
    /// Create a new platform client.
    ///
    /// # Errors
    ///
    /// Returns error if a header value is invalid or the HTTP client fails to build.
    pub fn new(config: &PlatformConfig) -> Result<Self, PlatformError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Appwrite-Project",
            HeaderValue::from_str(&config.project_id)
                .map_err(|e| PlatformError::InvalidRequest(format!("Invalid project id: {e}")))?,
        );
        headers.insert(
            "X-Appwrite-Response-Format",
            HeaderValue::from_static(RESPONSE_FORMAT),
        );
        let api_key = config
            .api_key
            .as_ref()
            .map(|key| {
                HeaderValue::from_str(key.expose_secret()).map(|mut value| {
                    value.set_sensitive(true);
                    value
                })
            })
            .transpose()
            .map_err(|e| PlatformError::InvalidRequest(format!("Invalid API key: {e}")))?;

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(AppwriteClientInner {
                client,
                endpoint: config.endpoint.clone(),
                project_id: config.project_id.clone(),
                api_key,
            }),
        })
    }

    /// Build an endpoint URL from path segments (each segment is escaped).
    fn url(&self, segments: &[&str]) -> Result<Url, PlatformError> {
        let mut url = self.inner.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| PlatformError::InvalidRequest("endpoint cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Start a request as the session's user, or as the server when there
    /// is no session.
    fn request(
        &self,
        method: Method,
        url: Url,
        session: Option<&SessionSecret>,
    ) -> RequestBuilder {
        let builder = self.inner.client.request(method, url);
        match (session, &self.inner.api_key) {
            (Some(secret), _) => builder.header(SESSION_HEADER, secret.expose()),
            (None, Some(key)) => builder.header(KEY_HEADER, key.clone()),
            (None, None) => builder,
        }
    }

    /// Send a request and decode the JSON body.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, PlatformError> {
        let response = check_status(request.send().await?).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse platform response"
            );
            PlatformError::Parse(e.to_string())
        })
    }

    /// Send a request whose body is irrelevant.
    async fn send_empty(&self, request: RequestBuilder) -> Result<(), PlatformError> {
        check_status(request.send().await?).await?;
        Ok(())
    }

    /// Decode a session-creation response.
    ///
    /// Without a server key the platform blanks `secret` in the body and only
    /// delivers it in the `a_session_<project>` cookie.
    async fn session_from_response(&self, response: Response) -> Result<Session, PlatformError> {
        let response = check_status(response).await?;
        let cookie_secret = session_cookie(response.headers(), &self.inner.project_id);
        let mut session: Session = response
            .json()
            .await
            .map_err(|e| PlatformError::Parse(e.to_string()))?;
        if session.secret.is_empty()
            && let Some(secret) = cookie_secret
        {
            session.secret = secret;
        }
        Ok(session)
    }
}

/// Turn non-success responses into `PlatformError::Api`.
async fn check_status(response: Response) -> Result<Response, PlatformError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let (kind, message) = match serde_json::from_str::<ApiErrorBody>(&text) {
        Ok(body) => (body.kind, body.message),
        Err(_) => (
            "unknown".to_string(),
            text.chars().take(200).collect::<String>(),
        ),
    };

    tracing::debug!(status = %status, kind = %kind, "Platform returned error");

    Err(PlatformError::Api {
        status: status.as_u16(),
        kind,
        message,
    })
}

/// Extract the session secret from a `Set-Cookie: a_session_<project>=...` header.
fn session_cookie(headers: &HeaderMap, project_id: &str) -> Option<String> {
    let name = format!("a_session_{}=", project_id.to_lowercase());
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|cookie| {
            let pair = cookie.split(';').next()?.trim();
            pair.strip_prefix(&name)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        })
}

#[async_trait]
impl Platform for AppwriteClient {
    #[instrument(skip_all)]
    async fn create_email_password_session(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Session, PlatformError> {
        let url = self.url(&["account", "sessions", "email"])?;
        let body = serde_json::json!({
            "email": email.as_str(),
            "password": password.expose_secret(),
        });
        let response = self
            .request(Method::POST, url, None)
            .json(&body)
            .send()
            .await?;
        self.session_from_response(response).await
    }

    #[instrument(skip_all, fields(user_id = %user_id))]
    async fn create_session_from_token(
        &self,
        user_id: &UserId,
        secret: &SecretString,
    ) -> Result<Session, PlatformError> {
        let url = self.url(&["account", "sessions", "token"])?;
        let body = serde_json::json!({
            "userId": user_id.as_str(),
            "secret": secret.expose_secret(),
        });
        let response = self
            .request(Method::POST, url, None)
            .json(&body)
            .send()
            .await?;
        self.session_from_response(response).await
    }

    #[instrument(skip_all)]
    async fn get_account(&self, session: &SessionSecret) -> Result<Account, PlatformError> {
        let url = self.url(&["account"])?;
        self.send(self.request(Method::GET, url, Some(session)))
            .await
    }

    #[instrument(skip_all)]
    async fn get_session(&self, session: &SessionSecret) -> Result<Session, PlatformError> {
        let url = self.url(&["account", "sessions", "current"])?;
        self.send(self.request(Method::GET, url, Some(session)))
            .await
    }

    #[instrument(skip_all)]
    async fn delete_session(&self, session: &SessionSecret) -> Result<(), PlatformError> {
        let url = self.url(&["account", "sessions", "current"])?;
        self.send_empty(self.request(Method::DELETE, url, Some(session)))
            .await
    }

    #[instrument(skip_all, fields(user_id = %request.user_id))]
    async fn create_account(&self, request: &NewAccount) -> Result<Account, PlatformError> {
        let url = self.url(&["account"])?;
        let body = serde_json::json!({
            "userId": request.user_id.as_str(),
            "email": request.email.as_str(),
            "password": request.password.expose_secret(),
            "name": request.name,
        });
        self.send(self.request(Method::POST, url, None).json(&body))
            .await
    }

    #[instrument(skip_all)]
    async fn update_name(
        &self,
        session: &SessionSecret,
        name: &str,
    ) -> Result<Account, PlatformError> {
        let url = self.url(&["account", "name"])?;
        let body = serde_json::json!({ "name": name });
        self.send(self.request(Method::PATCH, url, Some(session)).json(&body))
            .await
    }

    #[instrument(skip_all)]
    async fn create_recovery(
        &self,
        email: &Email,
        redirect_url: &Url,
    ) -> Result<(), PlatformError> {
        let url = self.url(&["account", "recovery"])?;
        let body = serde_json::json!({
            "email": email.as_str(),
            "url": redirect_url.as_str(),
        });
        self.send_empty(self.request(Method::POST, url, None).json(&body))
            .await
    }

    fn oauth2_token_url(&self, request: &OAuthRequest) -> Result<Url, PlatformError> {
        let mut url = self.url(&["account", "tokens", "oauth2", request.provider.as_str()])?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("success", request.success.as_str())
                .append_pair("failure", request.failure.as_str())
                .append_pair("project", &self.inner.project_id);
            for scope in &request.scopes {
                query.append_pair("scopes[]", scope);
            }
        }
        Ok(url)
    }

    #[instrument(skip_all)]
    async fn list_teams(&self, session: &SessionSecret) -> Result<Vec<Team>, PlatformError> {
        let url = self.url(&["teams"])?;
        let list: TeamList = self
            .send(self.request(Method::GET, url, Some(session)))
            .await?;
        Ok(list.teams)
    }

    #[instrument(skip_all, fields(team = %team))]
    async fn list_memberships(
        &self,
        session: &SessionSecret,
        team: &TeamId,
    ) -> Result<Vec<Membership>, PlatformError> {
        let url = self.url(&["teams", team.as_str(), "memberships"])?;
        let list: MembershipList = self
            .send(self.request(Method::GET, url, Some(session)))
            .await?;
        Ok(list.memberships)
    }

    #[instrument(skip_all, fields(team = %request.team_id, user_id = %request.user_id))]
    async fn create_membership(
        &self,
        session: Option<&SessionSecret>,
        request: &NewMembership,
    ) -> Result<Membership, PlatformError> {
        let url = self.url(&["teams", request.team_id.as_str(), "memberships"])?;
        let body = serde_json::json!({
            "userId": request.user_id.as_str(),
            "roles": request.roles,
            "url": request.url.as_str(),
        });
        self.send(self.request(Method::POST, url, session).json(&body))
            .await
    }

    #[instrument(skip_all, fields(collection = %collection))]
    async fn list_documents(
        &self,
        session: Option<&SessionSecret>,
        database: &DatabaseId,
        collection: &CollectionId,
        queries: &[Query],
    ) -> Result<Vec<Document>, PlatformError> {
        let mut url = self.url(&[
            "databases",
            database.as_str(),
            "collections",
            collection.as_str(),
            "documents",
        ])?;
        {
            let mut pairs = url.query_pairs_mut();
            for query in queries {
                pairs.append_pair("queries[]", &query.to_wire());
            }
        }
        let list: DocumentList = self
            .send(self.request(Method::GET, url, session))
            .await?;
        Ok(list.documents)
    }

    #[instrument(skip_all, fields(collection = %collection, document = %id))]
    async fn create_document(
        &self,
        session: Option<&SessionSecret>,
        database: &DatabaseId,
        collection: &CollectionId,
        id: &DocumentId,
        data: serde_json::Value,
    ) -> Result<Document, PlatformError> {
        let url = self.url(&[
            "databases",
            database.as_str(),
            "collections",
            collection.as_str(),
            "documents",
        ])?;
        let body = serde_json::json!({
            "documentId": id.as_str(),
            "data": data,
        });
        self.send(self.request(Method::POST, url, session).json(&body))
            .await
    }

    #[instrument(skip_all, fields(bucket = %bucket, file = %id, size = upload.bytes.len()))]
    async fn create_file(
        &self,
        session: Option<&SessionSecret>,
        bucket: &BucketId,
        id: &FileId,
        upload: FileUpload,
    ) -> Result<StoredFile, PlatformError> {
        let url = self.url(&["storage", "buckets", bucket.as_str(), "files"])?;
        let part = reqwest::multipart::Part::stream(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)?;
        let form = reqwest::multipart::Form::new()
            .text("fileId", id.as_str().to_string())
            .part("file", part);
        self.send(self.request(Method::POST, url, session).multipart(form))
            .await
    }

    fn file_view_url(&self, bucket: &BucketId, file: &FileId) -> Result<Url, PlatformError> {
        if file.as_str().is_empty() {
            return Err(PlatformError::InvalidRequest("empty file id".to_string()));
        }
        let mut url = self.url(&[
            "storage",
            "buckets",
            bucket.as_str(),
            "files",
            file.as_str(),
            "view",
        ])?;
        url.query_pairs_mut()
            .append_pair("project", &self.inner.project_id);
        Ok(url)
    }

    #[instrument(skip_all)]
    async fn health(&self) -> Result<(), PlatformError> {
        let url = self.url(&["health", "version"])?;
        self.send_empty(self.request(Method::GET, url, None)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::PlatformBackend;
    use crate::platform::OAuthProvider;

    fn client() -> AppwriteClient {
        client_with_key(None)
    }

    fn client_with_key(api_key: Option<&str>) -> AppwriteClient {
        AppwriteClient::new(&PlatformConfig {
            backend: PlatformBackend::Appwrite,
            endpoint: Url::parse("https://cloud.example.io/v1/").unwrap(),
            project_id: "gallery-prod".to_string(),
            api_key: api_key.map(|key| SecretString::from(key.to_owned())),
            database_id: DatabaseId::new("db"),
            image_collection_id: CollectionId::new("images"),
            image_bucket_id: BucketId::new("pictures"),
            admin_team_id: TeamId::new("admins"),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_session_requests_never_carry_the_api_key() {
        let keyed = client_with_key(Some("server-key"));
        let url = keyed.url(&["account"]).unwrap();
        let secret = SessionSecret::new("user-secret");

        let request = keyed
            .request(Method::GET, url, Some(&secret))
            .build()
            .unwrap();
        assert_eq!(request.headers()[SESSION_HEADER], "user-secret");
        assert!(request.headers().get(KEY_HEADER).is_none());
    }

    #[test]
    fn test_server_requests_carry_the_api_key() {
        let keyed = client_with_key(Some("server-key"));
        let url = keyed.url(&["account", "sessions", "email"]).unwrap();

        let request = keyed.request(Method::POST, url, None).build().unwrap();
        assert_eq!(request.headers()[KEY_HEADER], "server-key");
        assert!(request.headers().get(SESSION_HEADER).is_none());

        let keyless = client();
        let url = keyless.url(&["account", "sessions", "email"]).unwrap();
        let request = keyless.request(Method::POST, url, None).build().unwrap();
        assert!(request.headers().get(KEY_HEADER).is_none());
    }

    #[test]
    fn test_file_view_url() {
        let url = client()
            .file_view_url(&BucketId::new("pictures"), &FileId::new("f1"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://cloud.example.io/v1/storage/buckets/pictures/files/f1/view?project=gallery-prod"
        );
    }

    #[test]
    fn test_file_view_url_rejects_empty_id() {
        let result = client().file_view_url(&BucketId::new("pictures"), &FileId::new(""));
        assert!(matches!(result, Err(PlatformError::InvalidRequest(_))));
    }

    #[test]
    fn test_url_escapes_segments() {
        let url = client().url(&["teams", "a/b", "memberships"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://cloud.example.io/v1/teams/a%2Fb/memberships"
        );
    }

    #[test]
    fn test_oauth_url_carries_scopes() {
        let request = OAuthRequest {
            provider: OAuthProvider::Google,
            success: Url::parse("https://gallery.test/auth/oauth/callback").unwrap(),
            failure: Url::parse("https://gallery.test/auth/login").unwrap(),
            scopes: vec!["profile".to_string(), "email".to_string()],
        };
        let url = client().oauth2_token_url(&request).unwrap();
        assert!(url.path().ends_with("/account/tokens/oauth2/google"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&(
            "success".to_string(),
            "https://gallery.test/auth/oauth/callback".to_string()
        )));
        assert!(pairs.contains(&("project".to_string(), "gallery-prod".to_string())));
        let scopes: Vec<&str> = pairs
            .iter()
            .filter(|(k, _)| k == "scopes[]")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(scopes, vec!["profile", "email"]);
    }

    #[test]
    fn test_session_cookie_extraction() {
        let mut headers = HeaderMap::new();
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("a_session_gallery-prod_legacy=old; Path=/"),
        );
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("a_session_gallery-prod=s3cr3t; Path=/; HttpOnly"),
        );
        assert_eq!(
            session_cookie(&headers, "gallery-prod"),
            Some("s3cr3t".to_string())
        );
        assert_eq!(session_cookie(&headers, "other"), None);
    }
}
