//! Role derivation from admin-team membership.

use std::sync::Arc;

use tracing::instrument;

use picture_gallery_core::{RoleLookup, TeamId, UserId};

use crate::platform::{Platform, PlatformError, SessionSecret};

/// Derives a user's role from the configured admin team.
///
/// The only role source: a user is an admin iff the admin team is visible to
/// their session and holds a confirmed membership for them.
#[derive(Clone)]
pub struct RoleResolver {
    platform: Arc<dyn Platform>,
    admin_team: TeamId,
}

impl RoleResolver {
    #[must_use]
    pub fn new(platform: Arc<dyn Platform>, admin_team: TeamId) -> Self {
        Self {
            platform,
            admin_team,
        }
    }

    #[must_use]
    pub const fn admin_team(&self) -> &TeamId {
        &self.admin_team
    }

    /// Resolve the role of `user`, acting with `session`.
    ///
    /// Never fails: a lookup error is reported as [`RoleLookup::Unknown`].
    #[instrument(skip(self, session), fields(user_id = %user))]
    pub async fn resolve(&self, session: &SessionSecret, user: &UserId) -> RoleLookup {
        match self.lookup(session, user).await {
            Ok(lookup) => lookup,
            Err(e) => {
                tracing::warn!(error = %e, "Admin membership lookup failed, granting user role");
                RoleLookup::Unknown
            }
        }
    }

    async fn lookup(
        &self,
        session: &SessionSecret,
        user: &UserId,
    ) -> Result<RoleLookup, PlatformError> {
        let teams = self.platform.list_teams(session).await?;
        if !teams.iter().any(|team| team.id == self.admin_team) {
            return Ok(RoleLookup::User);
        }

        let memberships = self
            .platform
            .list_memberships(session, &self.admin_team)
            .await?;
        let confirmed = memberships
            .iter()
            .any(|m| &m.user_id == user && m.team_id == self.admin_team && m.confirm);

        Ok(if confirmed {
            RoleLookup::Admin
        } else {
            RoleLookup::User
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use url::Url;

    use picture_gallery_core::Email;

    use super::*;
    use crate::platform::MemoryPlatform;
    use crate::platform::memory::Fault;

    async fn signed_in(platform: &MemoryPlatform, email: &str) -> (UserId, SessionSecret) {
        let user = platform.add_account(email, "correct-horse", "Someone");
        let secret = platform
            .create_email_password_session(
                &Email::parse(email).unwrap(),
                &SecretString::from("correct-horse"),
            )
            .await
            .unwrap()
            .session_secret()
            .unwrap();
        (user, secret)
    }

    fn setup() -> (MemoryPlatform, RoleResolver) {
        let platform = MemoryPlatform::new(Url::parse("http://localhost/").unwrap(), "local");
        let resolver = RoleResolver::new(Arc::new(platform.clone()), TeamId::new("admins"));
        (platform, resolver)
    }

    #[tokio::test]
    async fn test_confirmed_membership_is_admin() {
        let (platform, resolver) = setup();
        platform.add_team(&TeamId::new("admins"), "Admins");
        let (user, secret) = signed_in(&platform, "ada@example.com").await;
        platform.add_membership(&TeamId::new("admins"), &user, true);

        assert_eq!(resolver.resolve(&secret, &user).await, RoleLookup::Admin);
    }

    #[tokio::test]
    async fn test_unconfirmed_membership_is_user() {
        let (platform, resolver) = setup();
        platform.add_team(&TeamId::new("admins"), "Admins");
        let (user, secret) = signed_in(&platform, "ada@example.com").await;
        platform.add_membership(&TeamId::new("admins"), &user, false);

        assert_eq!(resolver.resolve(&secret, &user).await, RoleLookup::User);
    }

    #[tokio::test]
    async fn test_other_users_membership_does_not_count() {
        let (platform, resolver) = setup();
        let team = TeamId::new("admins");
        platform.add_team(&team, "Admins");
        let (user, secret) = signed_in(&platform, "ada@example.com").await;
        let other = platform.add_account("root@example.com", "correct-horse", "Root");
        platform.add_membership(&team, &other, true);
        // Unconfirmed own membership makes the team visible.
        platform.add_membership(&team, &user, false);

        assert_eq!(resolver.resolve(&secret, &user).await, RoleLookup::User);
    }

    #[tokio::test]
    async fn test_missing_admin_team_is_user() {
        let (platform, resolver) = setup();
        let (user, secret) = signed_in(&platform, "ada@example.com").await;

        assert_eq!(resolver.resolve(&secret, &user).await, RoleLookup::User);
        assert_eq!(platform.call_count("list_memberships"), 0);
    }

    #[tokio::test]
    async fn test_lookup_failure_is_unknown() {
        let (platform, resolver) = setup();
        platform.add_team(&TeamId::new("admins"), "Admins");
        let (user, secret) = signed_in(&platform, "ada@example.com").await;
        platform.add_membership(&TeamId::new("admins"), &user, true);
        platform.inject_fault(Fault::TeamLookup);

        let lookup = resolver.resolve(&secret, &user).await;
        assert!(lookup.is_unknown());
        assert_eq!(lookup.granted_role(), picture_gallery_core::Role::User);
    }
}
