//! Per-request identity resolution.
//!
//! Runs as middleware in front of every API route. It never rejects a
//! request: a missing or bad token just leaves the request anonymous, and
//! handlers that need an identity reject it themselves.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};

use super::identity::AuthenticatedIdentity;
use super::state::HasAuthBackend;
use crate::db::Database;
use crate::jwt::{TokenKind, TokenService};

const BEARER_PREFIX: &str = "Bearer ";

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Turn an access token into an identity, or `None` if it does not check out.
pub async fn resolve_identity(
    tokens: &TokenService,
    db: &Database,
    token: &str,
) -> Option<AuthenticatedIdentity> {
    let claims = match tokens.decode_kind(token, TokenKind::Access) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(reason = %e, "Ignoring bearer token");
            return None;
        }
    };

    let user = match db.users().get_by_username(&claims.sub).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            debug!(username = %claims.sub, "Bearer token for unknown user");
            return None;
        }
        Err(e) => {
            error!(error = %e, "Failed to load user for bearer token");
            return None;
        }
    };

    match tokens.is_valid(token, &user.username) {
        Ok(true) => Some(AuthenticatedIdentity::from_user(&user)),
        Ok(false) => {
            debug!(username = %user.username, "Bearer token expired");
            None
        }
        Err(e) => {
            debug!(reason = %e, "Ignoring bearer token");
            None
        }
    }
}

/// Middleware that attaches an [`AuthenticatedIdentity`] to the request
/// extensions when a valid access token is presented.
pub async fn identity_middleware<S>(
    State(state): State<S>,
    mut request: Request,
    next: Next,
) -> Response
where
    S: HasAuthBackend + Clone + Send + Sync + 'static,
{
    if request.extensions().get::<AuthenticatedIdentity>().is_some() {
        return next.run(request).await;
    }

    let token = bearer_token(request.headers()).map(str::to_string);
    if let Some(token) = token {
        if let Some(identity) = resolve_identity(state.tokens(), state.db(), &token).await {
            request.extensions_mut().insert(identity);
        }
    }

    next.run(request).await
}
