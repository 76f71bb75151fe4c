//! Rate limiting for authentication endpoints.
//!
//! Uses a token bucket per client to slow down credential guessing and
//! registration spam.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};
use tracing::warn;

use crate::api::ApiError;
use crate::auth::client_key;
use crate::cli::IpExtractor;

/// Per-client rate limiter keyed by [`client_key`].
pub type ClientLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Default attempts per minute per client on the auth endpoints.
pub const DEFAULT_AUTH_ATTEMPTS_PER_MINUTE: u32 = 30;

/// Rate limiting configuration for authentication endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Shared by login, register and refresh.
    pub auth: Arc<ClientLimiter>,
    /// Where the client address comes from, `None` for the socket address.
    pub ip_extractor: Option<IpExtractor>,
}

impl RateLimitConfig {
    pub fn per_minute(attempts: NonZeroU32, ip_extractor: Option<IpExtractor>) -> Self {
        Self {
            auth: Arc::new(RateLimiter::keyed(Quota::per_minute(attempts))),
            ip_extractor,
        }
    }
}

/// Middleware for rate limiting the auth endpoints.
pub async fn rate_limit_auth(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let key = match client_key(&request, config.ip_extractor) {
        Ok(key) => key,
        Err(reason) => {
            warn!(reason, path = %request.uri().path(), "Unable to determine client IP");
            return ApiError::forbidden("Unable to determine client IP").into_response();
        }
    };

    match config.auth.check_key(&key) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(client = %key, path = %request.uri().path(), "Auth rate limit exceeded");
            ApiError::too_many_requests("Too many attempts. Please wait before trying again.")
                .into_response()
        }
    }
}
