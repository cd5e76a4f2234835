//! Signup form validation.

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

use picture_gallery_core::{Email, EmailError, Role};

use crate::platform::MIN_PASSWORD_LENGTH;
use crate::services::auth::{AuthError, AuthManager, AuthRedirect};

/// Errors from the signup form.
#[derive(Debug, Error)]
pub enum SignupError {
    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Name is required")]
    NameRequired,

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Password must be at least 8 characters")]
    PasswordTooShort,

    /// The form was valid but the account could not be created.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl SignupError {
    /// Message shown above the form.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// Signup form as posted by the browser.
#[derive(Clone, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    /// Requested role; admins still need a confirmed team membership.
    #[serde(default)]
    pub role: Role,
}

impl std::fmt::Debug for SignupForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignupForm")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("confirm_password", &"[REDACTED]")
            .field("role", &self.role)
            .finish()
    }
}

/// A signup form that passed validation.
#[derive(Debug)]
pub struct ValidSignup {
    pub name: String,
    pub email: Email,
    pub password: SecretString,
    pub role: Role,
}

impl SignupForm {
    /// Check the form locally, before anything is sent to the platform.
    ///
    /// # Errors
    ///
    /// Returns the first rule the form breaks, checking the password
    /// confirmation first.
    pub fn validate(&self) -> Result<ValidSignup, SignupError> {
        if self.password != self.confirm_password {
            return Err(SignupError::PasswordMismatch);
        }
        let name = self.name.trim();
        if name.is_empty() {
            return Err(SignupError::NameRequired);
        }
        let email = Email::parse(&self.email)?;
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(SignupError::PasswordTooShort);
        }

        Ok(ValidSignup {
            name: name.to_string(),
            email,
            password: SecretString::from(self.password.clone()),
            role: self.role,
        })
    }

    /// Validate and register.
    ///
    /// On success the browser goes to the email verification notice rather
    /// than the manager's own landing page.
    ///
    /// # Errors
    ///
    /// Returns a validation error (no platform call made) or
    /// `SignupError::Auth` if registration fails.
    pub async fn submit(&self, auth: &AuthManager) -> Result<AuthRedirect, SignupError> {
        let signup = self.validate()?;
        auth.signup(
            signup.email.as_str(),
            &signup.password,
            &signup.name,
            signup.role,
        )
        .await?;
        Ok(AuthRedirect::VerifyEmail)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use url::Url;

    use picture_gallery_core::TeamId;

    use super::*;
    use crate::platform::MemoryPlatform;
    use crate::services::auth::AuthSettings;

    fn form() -> SignupForm {
        SignupForm {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "correct-horse".to_string(),
            confirm_password: "correct-horse".to_string(),
            role: Role::User,
        }
    }

    fn manager(platform: &MemoryPlatform) -> AuthManager {
        AuthManager::new(
            Arc::new(platform.clone()),
            AuthSettings {
                base_url: Url::parse("http://gallery.test/").unwrap(),
                admin_team: TeamId::new("admins"),
            },
        )
    }

    #[test]
    fn test_mismatch_is_checked_first() {
        let form = SignupForm {
            name: String::new(),
            confirm_password: "different".to_string(),
            ..form()
        };
        assert!(matches!(form.validate(), Err(SignupError::PasswordMismatch)));
        assert_eq!(
            SignupError::PasswordMismatch.user_message(),
            "Passwords do not match"
        );
    }

    #[test]
    fn test_field_rules() {
        let no_name = SignupForm {
            name: "   ".to_string(),
            ..form()
        };
        assert!(matches!(no_name.validate(), Err(SignupError::NameRequired)));

        let bad_email = SignupForm {
            email: "ada".to_string(),
            ..form()
        };
        assert!(matches!(bad_email.validate(), Err(SignupError::InvalidEmail(_))));

        let short = SignupForm {
            password: "short".to_string(),
            confirm_password: "short".to_string(),
            ..form()
        };
        assert!(matches!(short.validate(), Err(SignupError::PasswordTooShort)));

        let valid = form().validate().unwrap();
        assert_eq!(valid.email.as_str(), "ada@example.com");
    }

    #[test]
    fn test_debug_redacts_passwords() {
        let debug = format!("{:?}", form());
        assert!(!debug.contains("correct-horse"));
    }

    #[tokio::test]
    async fn test_mismatch_makes_no_platform_call() {
        let platform = MemoryPlatform::new(Url::parse("http://gallery.test/").unwrap(), "local");
        let auth = manager(&platform);
        let form = SignupForm {
            confirm_password: "different".to_string(),
            ..form()
        };

        assert!(form.submit(&auth).await.is_err());
        assert_eq!(platform.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_submit_redirects_to_verification() {
        let platform = MemoryPlatform::new(Url::parse("http://gallery.test/").unwrap(), "local");
        let auth = manager(&platform);

        let redirect = form().submit(&auth).await.unwrap();

        assert_eq!(redirect, AuthRedirect::VerifyEmail);
        assert!(platform.account_by_email("ada@example.com").is_some());
        assert!(auth.user().is_some());
    }
}
