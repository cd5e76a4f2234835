//! Roles derived from admin-team membership.
//!
//! The platform's user record has no role field. A user is an admin exactly
//! when a confirmed membership links them to the configured admin team; the
//! role is recomputed on every auth check and never persisted.

use serde::{Deserialize, Serialize};

/// Access role of a signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    /// Get the display name for this role.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Admin => "Administrator",
            Self::User => "User",
        }
    }

    /// Get the form/wire value for this role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// Outcome of a single role-derivation query.
///
/// `Unknown` means the lookup itself failed (missing permission, network
/// error). It is not an error for the caller: it grants the least-privileged
/// role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleLookup {
    /// A confirmed admin-team membership exists for the user.
    Admin,
    /// The admin team is missing or the user has no confirmed membership.
    User,
    /// The membership lookup failed.
    Unknown,
}

impl RoleLookup {
    /// The role actually granted for this lookup result.
    #[must_use]
    pub const fn granted_role(self) -> Role {
        match self {
            Self::Admin => Role::Admin,
            Self::User | Self::Unknown => Role::User,
        }
    }

    /// Returns true if the lookup could not be completed.
    #[must_use]
    pub const fn is_unknown(self) -> bool {
        matches!(self, Self::Unknown)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_degrades_to_user() {
        assert_eq!(RoleLookup::Admin.granted_role(), Role::Admin);
        assert_eq!(RoleLookup::User.granted_role(), Role::User);
        assert_eq!(RoleLookup::Unknown.granted_role(), Role::User);
        assert!(RoleLookup::Unknown.is_unknown());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert!("owner".parse::<Role>().is_err());
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn test_role_serde() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }
}
