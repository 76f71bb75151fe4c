//! Ownership and role checks.
//!
//! The predicates take `Option<&AuthenticatedIdentity>` so anonymous callers
//! go through the same code path and are simply denied. The `require_*`
//! variants turn a denial into [`AuthError::Unauthenticated`] when nobody is
//! signed in and [`AuthError::Forbidden`] otherwise. Mutating handlers call
//! one of them before touching storage.

use super::errors::AuthError;
use super::identity::AuthenticatedIdentity;
use crate::db::ADMIN_ROLE;

pub fn is_owner(identity: Option<&AuthenticatedIdentity>, owner_id: i64) -> bool {
    identity.is_some_and(|identity| identity.id == owner_id)
}

/// `role` is a bare name; it is matched as `ROLE_<role>`.
pub fn has_role(identity: Option<&AuthenticatedIdentity>, role: &str) -> bool {
    identity.is_some_and(|identity| identity.has_role(role))
}

pub fn is_owner_or_admin(identity: Option<&AuthenticatedIdentity>, owner_id: i64) -> bool {
    is_owner(identity, owner_id) || has_role(identity, ADMIN_ROLE)
}

pub fn require_identity(
    identity: Option<&AuthenticatedIdentity>,
) -> Result<&AuthenticatedIdentity, AuthError> {
    identity.ok_or(AuthError::Unauthenticated)
}

pub fn require_owner_or_admin(
    identity: Option<&AuthenticatedIdentity>,
    owner_id: i64,
) -> Result<(), AuthError> {
    require_identity(identity)?;
    if is_owner_or_admin(identity, owner_id) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

pub fn require_role(identity: Option<&AuthenticatedIdentity>, role: &str) -> Result<(), AuthError> {
    require_identity(identity)?;
    if has_role(identity, role) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: i64, roles: &[&str]) -> AuthenticatedIdentity {
        AuthenticatedIdentity {
            id,
            username: format!("user{id}"),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn test_is_owner() {
        let alice = identity(1, &["ROLE_USER"]);
        assert!(is_owner(Some(&alice), 1));
        assert!(!is_owner(Some(&alice), 2));
        assert!(!is_owner(None, 1));
    }

    #[test]
    fn test_has_role_requires_prefixed_authority() {
        let admin = identity(1, &["ROLE_ADMIN"]);
        let bare = identity(2, &["ADMIN"]);
        assert!(has_role(Some(&admin), "ADMIN"));
        assert!(!has_role(Some(&bare), "ADMIN"));
        assert!(!has_role(None, "ADMIN"));
    }

    #[test]
    fn test_is_owner_or_admin() {
        let owner = identity(1, &["ROLE_USER"]);
        let other = identity(2, &["ROLE_USER"]);
        let admin = identity(3, &["ROLE_USER", "ROLE_ADMIN"]);

        assert!(is_owner_or_admin(Some(&owner), 1));
        assert!(!is_owner_or_admin(Some(&other), 1));
        assert!(is_owner_or_admin(Some(&admin), 1));
        for owner_id in [0, 1, 2, i64::MAX] {
            assert!(!is_owner_or_admin(None, owner_id));
        }
    }

    #[test]
    fn test_require_distinguishes_anonymous_from_forbidden() {
        let other = identity(2, &["ROLE_USER"]);

        assert!(matches!(
            require_owner_or_admin(None, 1),
            Err(AuthError::Unauthenticated)
        ));
        assert!(matches!(
            require_owner_or_admin(Some(&other), 1),
            Err(AuthError::Forbidden)
        ));
        assert!(require_owner_or_admin(Some(&other), 2).is_ok());

        assert!(matches!(
            require_role(None, ADMIN_ROLE),
            Err(AuthError::Unauthenticated)
        ));
        assert!(matches!(
            require_role(Some(&other), ADMIN_ROLE),
            Err(AuthError::Forbidden)
        ));
        assert!(require_role(Some(&other), "USER").is_ok());
    }
}
