//! In-process platform.
//!
//! Keeps accounts, sessions, teams, documents and files in memory so the
//! service can run without a hosted backend. Faults can be injected per
//! operation to exercise the degraded paths of the services.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use axum::body::Bytes;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use picture_gallery_core::{
    BucketId, CollectionId, DatabaseId, DocumentId, Email, FileId, MembershipId, TeamId, UserId,
};

use super::{
    Account, Document, FileUpload, Membership, NewAccount, NewMembership, OAuthRequest, Platform,
    MIN_PASSWORD_LENGTH, PlatformError, Query, Session, SessionSecret, StoredFile, Team,
    unique_id,
};

/// An operation that can be made to fail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fault {
    /// Email/password and token session creation.
    SessionCreation,
    /// `get_account` for any session.
    AccountLookup,
    /// `list_teams` and `list_memberships`.
    TeamLookup,
    /// `create_membership`.
    MembershipCreation,
    /// `delete_session`.
    SessionDeletion,
    /// `list_documents`.
    DocumentListing,
    /// `create_file` for a file with this name.
    Upload(String),
    /// `file_view_url` for this file.
    FileUrl(FileId),
    /// `health`.
    Health,
}

/// Identity the simulated OAuth provider consents as.
#[derive(Debug, Clone)]
pub struct OAuthIdentity {
    pub email: String,
    pub name: String,
}

/// A stored blob.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug)]
struct AccountRecord {
    account: Account,
    password: String,
}

#[derive(Debug)]
struct DocumentRecord {
    seq: u64,
    document: Document,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<UserId, AccountRecord>,
    /// Keyed by session secret.
    sessions: HashMap<String, Session>,
    /// One-time OAuth tokens, keyed by token secret.
    tokens: HashMap<String, UserId>,
    teams: Vec<Team>,
    memberships: Vec<Membership>,
    documents: HashMap<(DatabaseId, CollectionId), Vec<DocumentRecord>>,
    files: HashMap<(BucketId, FileId), (StoredFile, StoredBlob)>,
    recoveries: Vec<(String, Url)>,
    oauth_identity: Option<OAuthIdentity>,
    faults: HashSet<Fault>,
    calls: HashMap<&'static str, usize>,
    next_seq: u64,
}

/// In-memory [`Platform`] implementation.
///
/// Cloning shares the underlying state.
#[derive(Clone)]
pub struct MemoryPlatform {
    inner: Arc<MemoryPlatformInner>,
}

struct MemoryPlatformInner {
    /// Base URL file view links are built on.
    endpoint: Url,
    project_id: String,
    state: Mutex<State>,
}

impl MemoryPlatform {
    /// Create an empty platform whose file URLs are served from `endpoint`.
    #[must_use]
    pub fn new(endpoint: Url, project_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(MemoryPlatformInner {
                endpoint,
                project_id: project_id.into(),
                state: Mutex::new(State::default()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Fixtures
    // =========================================================================

    /// Create a team.
    pub fn add_team(&self, id: &TeamId, name: &str) {
        self.state().teams.push(Team {
            id: id.clone(),
            name: name.to_string(),
        });
    }

    /// Register an account directly, bypassing validation.
    pub fn add_account(&self, email: &str, password: &str, name: &str) -> UserId {
        let id = UserId::new(unique_id());
        self.state().accounts.insert(
            id.clone(),
            AccountRecord {
                account: Account {
                    id: id.clone(),
                    name: name.to_string(),
                    email: email.to_string(),
                    email_verification: true,
                },
                password: password.to_string(),
            },
        );
        id
    }

    /// Add a membership of `user` in `team`.
    pub fn add_membership(&self, team: &TeamId, user: &UserId, confirm: bool) {
        self.state().memberships.push(Membership {
            id: MembershipId::new(unique_id()),
            user_id: user.clone(),
            team_id: team.clone(),
            roles: vec!["owner".to_string()],
            confirm,
        });
    }

    /// Mark every membership of `user` in `team` as accepted.
    pub fn confirm_membership(&self, team: &TeamId, user: &UserId) {
        for membership in &mut self.state().memberships {
            if &membership.team_id == team && &membership.user_id == user {
                membership.confirm = true;
            }
        }
    }

    /// Insert a document with an explicit creation timestamp.
    pub fn add_document(
        &self,
        database: &DatabaseId,
        collection: &CollectionId,
        created_at: &str,
        data: serde_json::Value,
    ) -> DocumentId {
        let id = DocumentId::new(unique_id());
        let document = Document {
            id: id.clone(),
            created_at: created_at.to_string(),
            data: match data {
                serde_json::Value::Object(map) => map,
                _ => serde_json::Map::new(),
            },
        };
        let mut state = self.state();
        let seq = state.bump_seq();
        state
            .documents
            .entry((database.clone(), collection.clone()))
            .or_default()
            .push(DocumentRecord { seq, document });
        id
    }

    /// Configure the identity the OAuth flow signs in as.
    ///
    /// Without one, OAuth initiation sends the browser to the failure URL.
    pub fn set_oauth_identity(&self, identity: Option<OAuthIdentity>) {
        self.state().oauth_identity = identity;
    }

    /// Make an operation fail until [`Self::clear_fault`] is called.
    pub fn inject_fault(&self, fault: Fault) {
        self.state().faults.insert(fault);
    }

    pub fn clear_fault(&self, fault: &Fault) {
        self.state().faults.remove(fault);
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Number of times the named trait method was called.
    #[must_use]
    pub fn call_count(&self, operation: &str) -> usize {
        self.state().calls.get(operation).copied().unwrap_or(0)
    }

    /// Total platform calls across all operations.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.state().calls.values().sum()
    }

    #[must_use]
    pub fn document_count(&self, database: &DatabaseId, collection: &CollectionId) -> usize {
        self.state()
            .documents
            .get(&(database.clone(), collection.clone()))
            .map_or(0, Vec::len)
    }

    #[must_use]
    pub fn file_count(&self, bucket: &BucketId) -> usize {
        self.state()
            .files
            .keys()
            .filter(|(b, _)| b == bucket)
            .count()
    }

    /// Bytes of a stored file.
    #[must_use]
    pub fn file(&self, bucket: &BucketId, file: &FileId) -> Option<StoredBlob> {
        self.state()
            .files
            .get(&(bucket.clone(), file.clone()))
            .map(|(_, blob)| blob.clone())
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.state().sessions.len()
    }

    /// Memberships of `user`, confirmed or not.
    #[must_use]
    pub fn memberships_of(&self, user: &UserId) -> Vec<Membership> {
        self.state()
            .memberships
            .iter()
            .filter(|m| &m.user_id == user)
            .cloned()
            .collect()
    }

    /// Account registered under `email`.
    #[must_use]
    pub fn account_by_email(&self, email: &str) -> Option<Account> {
        self.state()
            .find_account_by_email(email)
            .map(|record| record.account.clone())
    }

    /// Recovery requests as `(email, redirect url)` pairs.
    #[must_use]
    pub fn recoveries(&self) -> Vec<(String, Url)> {
        self.state().recoveries.clone()
    }
}

impl State {
    fn record(&mut self, operation: &'static str) {
        *self.calls.entry(operation).or_insert(0) += 1;
    }

    fn fail_if(&self, fault: &Fault) -> Result<(), PlatformError> {
        if self.faults.contains(fault) {
            return Err(server_error());
        }
        Ok(())
    }

    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn find_account_by_email(&self, email: &str) -> Option<&AccountRecord> {
        self.accounts
            .values()
            .find(|record| record.account.email.eq_ignore_ascii_case(email))
    }

    fn start_session(&mut self, user_id: UserId) -> Session {
        let session = Session {
            id: unique_id(),
            user_id,
            secret: unique_id(),
            expire: (chrono::Utc::now() + chrono::Duration::days(365)).to_rfc3339(),
            current: true,
        };
        self.sessions
            .insert(session.secret.clone(), session.clone());
        session
    }

    fn session_user(&self, session: &SessionSecret) -> Result<UserId, PlatformError> {
        self.sessions
            .get(session.expose())
            .map(|s| s.user_id.clone())
            .ok_or_else(unauthorized)
    }
}

fn server_error() -> PlatformError {
    PlatformError::api(
        500,
        "general_unknown",
        "Server Error. Please try again later.",
    )
}

fn unauthorized() -> PlatformError {
    PlatformError::api(
        401,
        "general_unauthorized_scope",
        "User (role: guests) missing scope (account)",
    )
}

#[async_trait]
impl Platform for MemoryPlatform {
    async fn create_email_password_session(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Session, PlatformError> {
        let mut state = self.state();
        state.record("create_email_password_session");
        state.fail_if(&Fault::SessionCreation)?;

        let user_id = state
            .find_account_by_email(email.as_str())
            .filter(|record| record.password == password.expose_secret())
            .map(|record| record.account.id.clone())
            .ok_or_else(|| {
                PlatformError::api(
                    401,
                    "user_invalid_credentials",
                    "Invalid credentials. Please check the email and password.",
                )
            })?;
        Ok(state.start_session(user_id))
    }

    async fn create_session_from_token(
        &self,
        user_id: &UserId,
        secret: &SecretString,
    ) -> Result<Session, PlatformError> {
        let mut state = self.state();
        state.record("create_session_from_token");
        state.fail_if(&Fault::SessionCreation)?;

        match state.tokens.remove(secret.expose_secret()) {
            Some(owner) if &owner == user_id => Ok(state.start_session(owner)),
            _ => Err(PlatformError::api(
                401,
                "user_invalid_token",
                "Invalid token passed in the request.",
            )),
        }
    }

    async fn get_account(&self, session: &SessionSecret) -> Result<Account, PlatformError> {
        let mut state = self.state();
        state.record("get_account");
        state.fail_if(&Fault::AccountLookup)?;

        let user_id = state.session_user(session)?;
        state
            .accounts
            .get(&user_id)
            .map(|record| record.account.clone())
            .ok_or_else(unauthorized)
    }

    async fn get_session(&self, session: &SessionSecret) -> Result<Session, PlatformError> {
        let mut state = self.state();
        state.record("get_session");
        state
            .sessions
            .get(session.expose())
            .cloned()
            .ok_or_else(unauthorized)
    }

    async fn delete_session(&self, session: &SessionSecret) -> Result<(), PlatformError> {
        let mut state = self.state();
        state.record("delete_session");
        state.fail_if(&Fault::SessionDeletion)?;
        state
            .sessions
            .remove(session.expose())
            .map(|_| ())
            .ok_or_else(unauthorized)
    }

    async fn create_account(&self, request: &NewAccount) -> Result<Account, PlatformError> {
        let mut state = self.state();
        state.record("create_account");

        let password_len = request.password.expose_secret().chars().count();
        if !(MIN_PASSWORD_LENGTH..=256).contains(&password_len) {
            return Err(PlatformError::api(
                400,
                "general_argument_invalid",
                "Invalid `password` param: Password must be between 8 and 256 characters long.",
            ));
        }
        if state.accounts.contains_key(&request.user_id)
            || state
                .find_account_by_email(request.email.as_str())
                .is_some()
        {
            return Err(PlatformError::api(
                409,
                "user_already_exists",
                "A user with the same id, email, or phone already exists in this project.",
            ));
        }

        let account = Account {
            id: request.user_id.clone(),
            name: request.name.clone(),
            email: request.email.as_str().to_string(),
            email_verification: false,
        };
        state.accounts.insert(
            request.user_id.clone(),
            AccountRecord {
                account: account.clone(),
                password: request.password.expose_secret().to_string(),
            },
        );
        Ok(account)
    }

    async fn update_name(
        &self,
        session: &SessionSecret,
        name: &str,
    ) -> Result<Account, PlatformError> {
        let mut state = self.state();
        state.record("update_name");

        let user_id = state.session_user(session)?;
        let record = state
            .accounts
            .get_mut(&user_id)
            .ok_or_else(unauthorized)?;
        record.account.name = name.to_string();
        Ok(record.account.clone())
    }

    async fn create_recovery(
        &self,
        email: &Email,
        redirect_url: &Url,
    ) -> Result<(), PlatformError> {
        let mut state = self.state();
        state.record("create_recovery");

        if state.find_account_by_email(email.as_str()).is_none() {
            return Err(PlatformError::api(
                404,
                "user_not_found",
                "User with the requested ID could not be found.",
            ));
        }
        state
            .recoveries
            .push((email.as_str().to_string(), redirect_url.clone()));
        Ok(())
    }

    /// Simulates provider consent: the configured identity is signed up if
    /// needed and a one-time token is appended to the success URL.
    fn oauth2_token_url(&self, request: &OAuthRequest) -> Result<Url, PlatformError> {
        let mut state = self.state();
        state.record("oauth2_token_url");

        let Some(identity) = state.oauth_identity.clone() else {
            return Ok(request.failure.clone());
        };

        let user_id = match state.find_account_by_email(&identity.email) {
            Some(record) => record.account.id.clone(),
            None => {
                let id = UserId::new(unique_id());
                state.accounts.insert(
                    id.clone(),
                    AccountRecord {
                        account: Account {
                            id: id.clone(),
                            name: identity.name,
                            email: identity.email,
                            email_verification: true,
                        },
                        password: String::new(),
                    },
                );
                id
            }
        };

        let token = unique_id();
        state.tokens.insert(token.clone(), user_id.clone());

        let mut url = request.success.clone();
        url.query_pairs_mut()
            .append_pair("userId", user_id.as_str())
            .append_pair("secret", &token);
        Ok(url)
    }

    async fn list_teams(&self, session: &SessionSecret) -> Result<Vec<Team>, PlatformError> {
        let mut state = self.state();
        state.record("list_teams");
        state.fail_if(&Fault::TeamLookup)?;

        let user_id = state.session_user(session)?;
        let teams = state
            .teams
            .iter()
            .filter(|team| {
                state
                    .memberships
                    .iter()
                    .any(|m| m.team_id == team.id && m.user_id == user_id)
            })
            .cloned()
            .collect();
        Ok(teams)
    }

    async fn list_memberships(
        &self,
        session: &SessionSecret,
        team: &TeamId,
    ) -> Result<Vec<Membership>, PlatformError> {
        let mut state = self.state();
        state.record("list_memberships");
        state.fail_if(&Fault::TeamLookup)?;

        state.session_user(session)?;
        if !state.teams.iter().any(|t| &t.id == team) {
            return Err(PlatformError::api(
                404,
                "team_not_found",
                "Team with the requested ID could not be found.",
            ));
        }
        Ok(state
            .memberships
            .iter()
            .filter(|m| &m.team_id == team)
            .cloned()
            .collect())
    }

    /// Memberships created with a user session are pending invitations;
    /// without one (server scope) they are confirmed immediately.
    async fn create_membership(
        &self,
        session: Option<&SessionSecret>,
        request: &NewMembership,
    ) -> Result<Membership, PlatformError> {
        let mut state = self.state();
        state.record("create_membership");
        state.fail_if(&Fault::MembershipCreation)?;

        if let Some(session) = session {
            state.session_user(session)?;
        }
        if !state.teams.iter().any(|t| t.id == request.team_id) {
            return Err(PlatformError::api(
                404,
                "team_not_found",
                "Team with the requested ID could not be found.",
            ));
        }

        let membership = Membership {
            id: MembershipId::new(unique_id()),
            user_id: request.user_id.clone(),
            team_id: request.team_id.clone(),
            roles: request.roles.clone(),
            confirm: session.is_none(),
        };
        state.memberships.push(membership.clone());
        Ok(membership)
    }

    async fn list_documents(
        &self,
        _session: Option<&SessionSecret>,
        database: &DatabaseId,
        collection: &CollectionId,
        queries: &[Query],
    ) -> Result<Vec<Document>, PlatformError> {
        let mut state = self.state();
        state.record("list_documents");
        state.fail_if(&Fault::DocumentListing)?;

        let mut records: Vec<&DocumentRecord> = state
            .documents
            .get(&(database.clone(), collection.clone()))
            .map(|docs| docs.iter().collect())
            .unwrap_or_default();

        let mut limit = None;
        for query in queries {
            match query {
                Query::OrderDesc(attribute) => records.sort_by(|a, b| {
                    sort_key(b, attribute).cmp(&sort_key(a, attribute))
                }),
                Query::OrderAsc(attribute) => records.sort_by(|a, b| {
                    sort_key(a, attribute).cmp(&sort_key(b, attribute))
                }),
                Query::Limit(n) => limit = usize::try_from(*n).ok(),
            }
        }

        Ok(records
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|record| record.document.clone())
            .collect())
    }

    async fn create_document(
        &self,
        _session: Option<&SessionSecret>,
        database: &DatabaseId,
        collection: &CollectionId,
        id: &DocumentId,
        data: serde_json::Value,
    ) -> Result<Document, PlatformError> {
        let serde_json::Value::Object(data) = data else {
            return Err(PlatformError::api(
                400,
                "document_invalid_structure",
                "Invalid document structure: data must be an object",
            ));
        };

        let mut state = self.state();
        state.record("create_document");

        let document = Document {
            id: id.clone(),
            created_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, false),
            data,
        };
        let seq = state.bump_seq();
        state
            .documents
            .entry((database.clone(), collection.clone()))
            .or_default()
            .push(DocumentRecord {
                seq,
                document: document.clone(),
            });
        Ok(document)
    }

    async fn create_file(
        &self,
        _session: Option<&SessionSecret>,
        bucket: &BucketId,
        id: &FileId,
        upload: FileUpload,
    ) -> Result<StoredFile, PlatformError> {
        let mut state = self.state();
        state.record("create_file");
        state.fail_if(&Fault::Upload(upload.file_name.clone()))?;

        let key = (bucket.clone(), id.clone());
        if state.files.contains_key(&key) {
            return Err(PlatformError::api(
                409,
                "storage_file_already_exists",
                "A storage file with the requested ID already exists.",
            ));
        }

        let file = StoredFile {
            id: id.clone(),
            name: upload.file_name,
            mime_type: upload.content_type.clone(),
            size_original: upload.bytes.len() as u64,
        };
        state.files.insert(
            key,
            (
                file.clone(),
                StoredBlob {
                    content_type: upload.content_type,
                    bytes: upload.bytes,
                },
            ),
        );
        Ok(file)
    }

    fn file_view_url(&self, bucket: &BucketId, file: &FileId) -> Result<Url, PlatformError> {
        if file.as_str().is_empty() || self.state().faults.contains(&Fault::FileUrl(file.clone()))
        {
            return Err(PlatformError::InvalidRequest(format!(
                "cannot resolve file '{file}'"
            )));
        }
        let mut url = self.inner.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| PlatformError::InvalidRequest("endpoint cannot be a base".to_string()))?
            .pop_if_empty()
            .extend([
                "storage",
                "buckets",
                bucket.as_str(),
                "files",
                file.as_str(),
                "view",
            ]);
        url.query_pairs_mut()
            .append_pair("project", &self.inner.project_id);
        Ok(url)
    }

    async fn health(&self) -> Result<(), PlatformError> {
        let mut state = self.state();
        state.record("health");
        state.fail_if(&Fault::Health)
    }
}

/// Ordering key: the attribute value (system timestamp or string attribute),
/// then insertion order.
fn sort_key<'a>(record: &'a DocumentRecord, attribute: &str) -> (&'a str, u64) {
    let value = match attribute {
        "$createdAt" => record.document.created_at.as_str(),
        other => record.document.string(other).unwrap_or_default(),
    };
    (value, record.seq)
}
