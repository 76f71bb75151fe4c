//! Axum extractors over the identity placed in the request extensions by
//! [`identity_middleware`](super::identity_middleware).

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::AuthError;
use super::identity::AuthenticatedIdentity;
use super::policy;
use crate::api::ApiError;
use crate::db::ADMIN_ROLE;

fn identity(parts: &Parts) -> Option<&AuthenticatedIdentity> {
    parts.extensions.get::<AuthenticatedIdentity>()
}

/// Extractor for endpoints that require a signed-in caller.
/// Rejects anonymous requests with 401.
pub struct Auth(pub AuthenticatedIdentity);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = policy::require_identity(identity(parts))?;
        Ok(Auth(identity.clone()))
    }
}

/// Optional authentication extractor - never fails.
/// Used by endpoints that serve anonymous callers but show more to owners.
pub struct OptionalAuth(pub Option<AuthenticatedIdentity>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(identity(parts).cloned()))
    }
}

/// Extractor for admin-only endpoints.
/// 401 when anonymous, 403 when signed in without the ADMIN role.
pub struct AdminOnly(pub AuthenticatedIdentity);

impl<S> FromRequestParts<S> for AdminOnly
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = identity(parts);
        policy::require_role(identity, ADMIN_ROLE)?;
        identity
            .cloned()
            .map(AdminOnly)
            .ok_or_else(|| AuthError::Unauthenticated.into())
    }
}
