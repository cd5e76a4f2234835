//! Gallery configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `GALLERY_BASE_URL` - Public URL of the gallery (used for OAuth and email links)
//! - `APPWRITE_ENDPOINT` - Platform API endpoint (e.g., `https://cloud.appwrite.io/v1`)
//! - `APPWRITE_PROJECT_ID` - Platform project ID
//! - `APPWRITE_DATABASE_ID` - Database holding the image collection
//! - `APPWRITE_IMAGE_COLLECTION_ID` - Collection of image documents
//! - `APPWRITE_IMAGE_BUCKET_ID` - Storage bucket of image files
//! - `APPWRITE_ADMIN_TEAM_ID` - Team whose confirmed members are admins
//!
//! The platform variables are not required when `GALLERY_PLATFORM=memory`.
//!
//! ## Optional
//! - `GALLERY_HOST` - Bind address (default: 127.0.0.1)
//! - `GALLERY_PORT` - Listen port (default: 3000)
//! - `GALLERY_PLATFORM` - `appwrite` (default) or `memory`
//! - `GALLERY_DEFAULT_CATEGORY` - Category given to uploads (default: gallery)
//! - `GALLERY_RATE_LIMIT` - Rate limit auth form posts (default: true)
//! - `GALLERY_STATIC_DIR` - Stylesheet and script directory (default: crates/web/static)
//! - `APPWRITE_API_KEY` - Server API key (enables session secrets on login)
//! - `APPWRITE_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use picture_gallery_core::{BucketId, CollectionId, DatabaseId, TeamId};

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Category assigned to uploads unless configured otherwise.
pub const DEFAULT_CATEGORY: &str = "gallery";

const DEFAULT_STATIC_DIR: &str = "crates/web/static";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Which platform implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformBackend {
    /// Hosted Appwrite-compatible REST API.
    Appwrite,
    /// In-process platform; data is lost on restart.
    Memory,
}

impl std::str::FromStr for PlatformBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "appwrite" => Ok(Self::Appwrite),
            "memory" => Ok(Self::Memory),
            other => Err(format!("expected 'appwrite' or 'memory', got '{other}'")),
        }
    }
}

/// Gallery application configuration.
#[derive(Debug, Clone)]
pub struct GalleryConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the gallery
    pub base_url: Url,
    /// Category recorded on uploaded images
    pub default_category: String,
    /// Whether auth form posts are rate limited per client IP
    pub rate_limit: bool,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
    /// Backend platform configuration
    pub platform: PlatformConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Backend platform configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct PlatformConfig {
    pub backend: PlatformBackend,
    /// API endpoint including the version segment
    pub endpoint: Url,
    pub project_id: String,
    /// Server API key (server-side only)
    pub api_key: Option<SecretString>,
    pub database_id: DatabaseId,
    pub image_collection_id: CollectionId,
    pub image_bucket_id: BucketId,
    pub admin_team_id: TeamId,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("backend", &self.backend)
            .field("endpoint", &self.endpoint.as_str())
            .field("project_id", &self.project_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("database_id", &self.database_id)
            .field("image_collection_id", &self.image_collection_id)
            .field("image_bucket_id", &self.image_bucket_id)
            .field("admin_team_id", &self.admin_team_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GalleryConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the API key fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("GALLERY_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("GALLERY_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("GALLERY_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("GALLERY_PORT".to_string(), e.to_string()))?;
        let base_url = get_url("GALLERY_BASE_URL")?;
        let default_category = get_env_or_default("GALLERY_DEFAULT_CATEGORY", DEFAULT_CATEGORY);
        let rate_limit = get_env_or_default("GALLERY_RATE_LIMIT", "true")
            .parse::<bool>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("GALLERY_RATE_LIMIT".to_string(), e.to_string())
            })?;
        let static_dir = PathBuf::from(get_env_or_default("GALLERY_STATIC_DIR", DEFAULT_STATIC_DIR));

        let platform = PlatformConfig::from_env()?;

        Ok(Self {
            host,
            port,
            base_url,
            default_category,
            rate_limit,
            static_dir,
            platform,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Configuration for a memory-backed instance served from `base_url`.
    ///
    /// Used for local development and by the integration tests.
    #[must_use]
    pub fn memory(base_url: Url) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: base_url.port_or_known_default().unwrap_or(3000),
            platform: PlatformConfig::memory(base_url.clone()),
            base_url,
            default_category: DEFAULT_CATEGORY.to_string(),
            rate_limit: true,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Absolute URL of a path on this site.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be joined onto the base URL.
    pub fn url_for(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path)
    }

    /// Returns true if the site is served over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.scheme() == "https"
    }
}

impl PlatformConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let backend = get_env_or_default("GALLERY_PLATFORM", "appwrite")
            .parse::<PlatformBackend>()
            .map_err(|e| ConfigError::InvalidEnvVar("GALLERY_PLATFORM".to_string(), e))?;

        if backend == PlatformBackend::Memory {
            let base_url = get_url("GALLERY_BASE_URL")?;
            return Ok(Self::memory(base_url));
        }

        let timeout_secs = get_env_or_default("APPWRITE_TIMEOUT_SECS", "30")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("APPWRITE_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        let api_key = match get_optional_env("APPWRITE_API_KEY") {
            Some(key) => {
                validate_secret_strength(&key, "APPWRITE_API_KEY")?;
                Some(SecretString::from(key))
            }
            None => None,
        };

        Ok(Self {
            backend,
            endpoint: get_url("APPWRITE_ENDPOINT")?,
            project_id: get_required_env("APPWRITE_PROJECT_ID")?,
            api_key,
            database_id: DatabaseId::new(get_required_env("APPWRITE_DATABASE_ID")?),
            image_collection_id: CollectionId::new(get_required_env(
                "APPWRITE_IMAGE_COLLECTION_ID",
            )?),
            image_bucket_id: BucketId::new(get_required_env("APPWRITE_IMAGE_BUCKET_ID")?),
            admin_team_id: TeamId::new(get_required_env("APPWRITE_ADMIN_TEAM_ID")?),
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Memory backend settings. File URLs are served from `base_url`.
    fn memory(base_url: Url) -> Self {
        Self {
            backend: PlatformBackend::Memory,
            endpoint: base_url,
            project_id: "local".to_string(),
            api_key: None,
            database_id: DatabaseId::new("gallery"),
            image_collection_id: CollectionId::new("images"),
            image_bucket_id: BucketId::new("images"),
            admin_team_id: TeamId::new("admins"),
            timeout: Duration::from_secs(30),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as an absolute URL.
fn get_url(key: &str) -> Result<Url, ConfigError> {
    let value = get_required_env(key)?;
    parse_base_url(&value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e))
}

/// Parse a URL, normalizing it to end in `/` so relative joins append.
fn parse_base_url(value: &str) -> Result<Url, String> {
    let mut url = Url::parse(value).map_err(|e| e.to_string())?;
    if url.cannot_be_a_base() {
        return Err("must be an absolute http(s) URL".to_string());
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a generated API key."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"a".repeat(40), "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_base_url_appends_slash() {
        let url = parse_base_url("https://cloud.appwrite.io/v1").unwrap();
        assert_eq!(url.as_str(), "https://cloud.appwrite.io/v1/");
        assert_eq!(
            url.join("account").unwrap().as_str(),
            "https://cloud.appwrite.io/v1/account"
        );
        assert!(parse_base_url("mailto:a@b.c").is_err());
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn test_platform_backend_parse() {
        assert_eq!("memory".parse::<PlatformBackend>().unwrap(), PlatformBackend::Memory);
        assert_eq!("Appwrite".parse::<PlatformBackend>().unwrap(), PlatformBackend::Appwrite);
        assert!("firebase".parse::<PlatformBackend>().is_err());
    }

    #[test]
    fn test_memory_config() {
        let config = GalleryConfig::memory(Url::parse("http://127.0.0.1:4100/").unwrap());
        assert_eq!(config.port, 4100);
        assert_eq!(config.platform.backend, PlatformBackend::Memory);
        assert!(!config.is_secure());
        assert_eq!(
            config.url_for("auth/login").unwrap().as_str(),
            "http://127.0.0.1:4100/auth/login"
        );
        assert_eq!(config.socket_addr().port(), 4100);
    }

    #[test]
    fn test_platform_config_debug_redacts_api_key() {
        let mut platform = PlatformConfig::memory(Url::parse("http://localhost/").unwrap());
        platform.api_key = Some(SecretString::from("standard_8f7d6a5c4b3e2f1a"));
        let debug_output = format!("{platform:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("standard_8f7d6a5c4b3e2f1a"));
    }
}
