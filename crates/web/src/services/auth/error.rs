//! Authentication error types.

use thiserror::Error;

use crate::platform::PlatformError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] picture_gallery_core::EmailError),

    /// The operation needs a signed-in user.
    #[error("not signed in")]
    NotAuthenticated,

    /// The platform created a session but did not hand out its secret.
    #[error("platform did not return a session secret")]
    MissingSessionSecret,

    /// A redirect link could not be built from the base URL.
    #[error("invalid redirect URL: {0}")]
    InvalidRedirect(#[from] url::ParseError),

    /// The platform rejected the request or could not be reached.
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl AuthError {
    /// Message stored in the auth state and shown on the page.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidEmail(e) => format!("Invalid email: {e}"),
            Self::NotAuthenticated => "Please sign in to continue.".to_string(),
            Self::MissingSessionSecret | Self::InvalidRedirect(_) => {
                "Something went wrong. Please try again.".to_string()
            }
            Self::Platform(e) => e.user_message(),
        }
    }
}
