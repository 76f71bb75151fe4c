//! Login, registration and token refresh.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::post,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::MessageResponse;
use super::error::ApiError;
use super::validation;
use crate::auth::AuthService;
use crate::jwt::IssuedToken;
use crate::rate_limit::{RateLimitConfig, rate_limit_auth};

const TOKEN_TYPE: &str = "Bearer";

#[derive(Clone)]
pub struct AuthState {
    pub auth: AuthService,
    pub rate_limit_config: Option<Arc<RateLimitConfig>>,
}

pub fn router(state: AuthState) -> Router {
    let limited = Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/refresh", post(refresh))
        .with_state(state.auth.clone());

    let limited = match state.rate_limit_config {
        Some(config) => limited.layer(middleware::from_fn_with_state(config, rate_limit_auth)),
        None => limited,
    };

    Router::new()
        .route("/logout", post(logout))
        .merge(limited)
}

#[derive(Deserialize, Validate)]
struct LoginRequest {
    #[serde(deserialize_with = "validation::trimmed")]
    #[validate(custom(function = "validation::not_blank"))]
    username: String,
    #[validate(custom(function = "validation::not_blank"))]
    password: String,
}

#[derive(Deserialize, Validate)]
struct RegisterRequest {
    #[serde(deserialize_with = "validation::trimmed")]
    #[validate(length(min = 3, max = 16, message = "must be between 3 and 16 characters"))]
    username: String,
    #[serde(deserialize_with = "validation::trimmed")]
    #[validate(
        length(max = 100, message = "must be at most 100 characters"),
        email(message = "must be a well-formed email address")
    )]
    email: String,
    #[validate(length(min = 6, max = 60, message = "must be between 6 and 60 characters"))]
    password: String,
}

#[derive(Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    refresh_token: String,
    #[serde(rename = "type")]
    token_type: &'static str,
    id: i64,
    username: String,
    email: String,
    roles: Vec<String>,
    expires_at: String,
    refresh_expires_at: String,
}

#[derive(Serialize)]
struct RefreshResponse {
    token: String,
    #[serde(rename = "type")]
    token_type: &'static str,
    id: i64,
    username: String,
    email: String,
    roles: Vec<String>,
    expires_at: String,
}

#[derive(Serialize)]
struct RegisterResponse {
    message: &'static str,
    id: i64,
    username: String,
}

/// Token expiry as an RFC 3339 timestamp.
fn expiry(token: &IssuedToken) -> String {
    i64::try_from(token.expires_at)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|at| at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_default()
}

async fn login(
    State(auth): State<AuthService>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;

    let outcome = auth
        .authenticate(&payload.username, &payload.password)
        .await?;

    Ok(Json(LoginResponse {
        expires_at: expiry(&outcome.access),
        refresh_expires_at: expiry(&outcome.refresh),
        token: outcome.access.token,
        refresh_token: outcome.refresh.token,
        token_type: TOKEN_TYPE,
        id: outcome.identity.id,
        username: outcome.identity.username,
        email: outcome.email,
        roles: outcome.identity.roles,
    }))
}

async fn register(
    State(auth): State<AuthService>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;

    let user = auth
        .register(&payload.username, &payload.email, &payload.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully",
            id: user.id,
            username: user.username,
        }),
    ))
}

async fn refresh(
    State(auth): State<AuthService>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = auth.refresh(&payload.refresh_token).await?;

    Ok(Json(RefreshResponse {
        expires_at: expiry(&outcome.access),
        token: outcome.access.token,
        token_type: TOKEN_TYPE,
        id: outcome.identity.id,
        username: outcome.identity.username,
        email: outcome.email,
        roles: outcome.identity.roles,
    }))
}

/// Tokens are not tracked server side, so there is nothing to revoke; the
/// client simply drops them.
async fn logout() -> impl IntoResponse {
    Json(MessageResponse::new("Logged out"))
}
