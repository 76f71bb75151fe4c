//! Authentication and authorization error taxonomy.

use thiserror::Error;

use crate::jwt::TokenError;
use crate::password::PasswordError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("username is already taken")]
    DuplicateUsername,
    #[error("email is already in use")]
    DuplicateEmail,
    #[error("role {0} is not configured")]
    RoleNotConfigured(String),
    #[error("token has expired")]
    TokenExpired,
    #[error("token is invalid")]
    InvalidToken,
    #[error("user not found")]
    UserNotFound,
    #[error("authentication required")]
    Unauthenticated,
    #[error("access denied")]
    Forbidden,
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error("failed to sign token: {0}")]
    Signing(#[source] TokenError),
}
