//! Credential checks, registration and token refresh.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::errors::AuthError;
use super::identity::AuthenticatedIdentity;
use crate::db::{Database, DuplicateKey, NewUser, USER_ROLE, User, duplicate_key};
use crate::impl_has_auth_backend;
use crate::jwt::{IssuedToken, TokenError, TokenKind, TokenService};
use crate::password::PasswordHasher;

/// Result of a successful login.
#[derive(Debug)]
pub struct LoginOutcome {
    pub identity: AuthenticatedIdentity,
    pub email: String,
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Result of a successful refresh. The presented refresh token is untouched.
#[derive(Debug)]
pub struct RefreshOutcome {
    pub identity: AuthenticatedIdentity,
    pub email: String,
    pub access: IssuedToken,
}

#[derive(Clone)]
pub struct AuthService {
    db: Database,
    tokens: Arc<TokenService>,
    hasher: PasswordHasher,
}

impl_has_auth_backend!(AuthService);

impl AuthService {
    pub fn new(db: Database, tokens: Arc<TokenService>, hasher: PasswordHasher) -> Self {
        Self { db, tokens, hasher }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// Check a username/password pair and issue an access and a refresh token.
    ///
    /// Unknown users and wrong passwords both yield
    /// [`AuthError::InvalidCredentials`]; only the debug log tells them apart.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome, AuthError> {
        let Some(user) = self.db.users().get_by_username(username).await? else {
            debug!(username = %username, "Login failed: unknown user");
            return Err(AuthError::InvalidCredentials);
        };

        let matches = self
            .hasher
            .verify_blocking(password.to_string(), user.password_hash.clone())
            .await?;
        if !matches {
            debug!(username = %user.username, "Login failed: password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let access = self
            .tokens
            .issue_access(&user.username)
            .map_err(AuthError::Signing)?;
        let refresh = self
            .tokens
            .issue_refresh(&user.username)
            .map_err(AuthError::Signing)?;

        info!(username = %user.username, user_id = user.id, "User logged in");

        Ok(LoginOutcome {
            identity: AuthenticatedIdentity::from_user(&user),
            email: user.email,
            access,
            refresh,
        })
    }

    /// Create an account holding the default USER role.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let user = self
            .create_account(username, email, password, &[USER_ROLE])
            .await?;
        info!(username = %user.username, user_id = user.id, "User registered");
        Ok(user)
    }

    /// Create an account holding `roles` (bare names).
    ///
    /// Existence is checked first for a precise error, but the unique
    /// constraints decide: a concurrent insert that slips past the checks is
    /// reported the same way.
    pub async fn create_account(
        &self,
        username: &str,
        email: &str,
        password: &str,
        roles: &[&str],
    ) -> Result<User, AuthError> {
        let users = self.db.users();
        if users.exists_by_username(username).await? {
            return Err(AuthError::DuplicateUsername);
        }
        if users.exists_by_email(email).await? {
            return Err(AuthError::DuplicateEmail);
        }

        let mut role_ids = Vec::with_capacity(roles.len());
        for name in roles {
            let role = self
                .db
                .roles()
                .find_by_name(name)
                .await?
                .ok_or_else(|| AuthError::RoleNotConfigured(name.to_string()))?;
            role_ids.push(role.id);
        }

        let password_hash = self.hasher.hash_blocking(password.to_string()).await?;
        let new_user = NewUser {
            username,
            email,
            password_hash: &password_hash,
        };

        self.insert_account(&new_user, &role_ids).await
    }

    /// Insert a user whose existence checks already passed. A unique
    /// constraint hit here means another request won the race.
    async fn insert_account(
        &self,
        new_user: &NewUser<'_>,
        role_ids: &[i64],
    ) -> Result<User, AuthError> {
        let users = self.db.users();
        let id = users
            .create(new_user, role_ids)
            .await
            .map_err(|e| match duplicate_key(&e) {
                Some(DuplicateKey::Username) => AuthError::DuplicateUsername,
                Some(DuplicateKey::Email) => AuthError::DuplicateEmail,
                None => AuthError::Storage(e),
            })?;

        users
            .get_by_id(id)
            .await?
            .ok_or(AuthError::Storage(sqlx::Error::RowNotFound))
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshOutcome, AuthError> {
        match self.tokens.is_expired(refresh_token) {
            Ok(false) => {}
            Ok(true) => return Err(AuthError::TokenExpired),
            Err(e) => return Err(token_failure(e)),
        }

        let claims = self
            .tokens
            .decode_kind(refresh_token, TokenKind::Refresh)
            .map_err(token_failure)?;

        let user = self
            .db
            .users()
            .get_by_username(&claims.sub)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !self
            .tokens
            .is_valid(refresh_token, &user.username)
            .map_err(token_failure)?
        {
            return Err(AuthError::InvalidToken);
        }

        let access = self
            .tokens
            .issue_access(&user.username)
            .map_err(AuthError::Signing)?;

        debug!(username = %user.username, "Access token refreshed");

        Ok(RefreshOutcome {
            identity: AuthenticatedIdentity::from_user(&user),
            email: user.email,
            access,
        })
    }
}

/// Collapse decode failures into [`AuthError::InvalidToken`]; the precise
/// reason is only logged.
fn token_failure(err: TokenError) -> AuthError {
    match err {
        TokenError::Time | TokenError::Encoding(_) => AuthError::Signing(err),
        other => {
            warn!(reason = %other, "Rejected refresh token");
            AuthError::InvalidToken
        }
    }
}
