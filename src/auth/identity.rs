//! The per-request principal.

use serde::Serialize;

use crate::db::User;

/// Prefix applied to stored role names to form an authority string.
pub const ROLE_PREFIX: &str = "ROLE_";

/// Build the authority string for a bare role name ("ADMIN" -> "ROLE_ADMIN").
pub fn authority(role: &str) -> String {
    format!("{ROLE_PREFIX}{role}")
}

/// Who is making the current request.
///
/// Built once by the identity resolver from a validated access token and the
/// matching user row, stored in the request extensions and dropped with the
/// request. Handlers depend on this value, never on [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedIdentity {
    pub id: i64,
    pub username: String,
    /// Authorities, e.g. `["ROLE_ADMIN", "ROLE_USER"]`.
    pub roles: Vec<String>,
}

impl AuthenticatedIdentity {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            roles: user.roles.iter().map(|role| authority(role)).collect(),
        }
    }

    /// Whether this identity holds `role` (a bare name such as "ADMIN").
    pub fn has_role(&self, role: &str) -> bool {
        let wanted = authority(role);
        self.roles.iter().any(|held| *held == wanted)
    }
}
