//! Platform error types.

use thiserror::Error;

/// Errors returned by [`super::Platform`] implementations.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The platform answered with an error document.
    ///
    /// `message` is the platform's human-readable text and is safe to show
    /// to the user; `kind` is the machine-readable error type.
    #[error("{message}")]
    Api {
        status: u16,
        kind: String,
        message: String,
    },

    /// Response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The request could not be built (bad URL, bad header value).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl PlatformError {
    /// HTTP status of an API error, if this is one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true for "no valid session" style errors.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status: 401, .. })
    }

    /// Returns true if the target resource does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }

    /// Returns true if the request conflicted with an existing resource.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Api { status: 409, .. })
    }

    /// Message suitable for showing to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            Self::Http(_) => "Could not reach the server. Please try again.".to_string(),
            Self::Parse(_) | Self::InvalidRequest(_) => "Unexpected server response".to_string(),
        }
    }

    /// Shorthand used by the in-memory platform.
    pub(crate) fn api(status: u16, kind: &str, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            kind: kind.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display_is_platform_message() {
        let err = PlatformError::api(401, "user_invalid_credentials", "Invalid credentials.");
        assert_eq!(err.to_string(), "Invalid credentials.");
        assert_eq!(err.user_message(), "Invalid credentials.");
        assert!(err.is_unauthorized());
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_classification() {
        assert!(PlatformError::api(404, "x", "missing").is_not_found());
        assert!(PlatformError::api(409, "x", "exists").is_conflict());
        let parse = PlatformError::Parse("bad json".into());
        assert_eq!(parse.status(), None);
        assert_eq!(parse.user_message(), "Unexpected server response");
    }
}
