//! User domain types.

use serde::{Deserialize, Serialize};

use picture_gallery_core::{Role, UserId};

use crate::platform::Account;

/// The signed-in user.
///
/// Mirrors the platform account plus the derived role, which is not stored
/// on the platform and is re-derived on every auth check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub email_verification: bool,
    pub role: Role,
}

impl SessionUser {
    /// Combine a platform account with a derived role.
    #[must_use]
    pub fn from_account(account: Account, role: Role) -> Self {
        Self {
            id: account.id,
            email: account.email,
            name: account.name,
            email_verification: account.email_verification,
            role,
        }
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    /// Name to greet the user with; falls back to the email address.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(name: &str) -> Account {
        Account {
            id: UserId::new("u1"),
            name: name.to_string(),
            email: "ada@example.com".to_string(),
            email_verification: true,
        }
    }

    #[test]
    fn test_from_account_keeps_role() {
        let user = SessionUser::from_account(account("Ada"), Role::Admin);
        assert!(user.is_admin());
        assert_eq!(user.display_name(), "Ada");
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let user = SessionUser::from_account(account("  "), Role::User);
        assert!(!user.is_admin());
        assert_eq!(user.display_name(), "ada@example.com");
    }
}
