mod articles;
mod auth;
mod comments;
mod error;
mod users;
mod validation;

use axum::{Router, middleware};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{AuthService, identity_middleware};
use crate::db::{Database, PageRequest};
use crate::rate_limit::RateLimitConfig;

pub use error::{ApiError, ResultExt};

/// `?page=&size=` query parameters.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageParams {
    page: Option<u32>,
    size: Option<u32>,
}

impl From<PageParams> for PageRequest {
    fn from(params: PageParams) -> Self {
        let defaults = PageRequest::default();
        PageRequest::new(
            params.page.unwrap_or(defaults.page),
            params.size.unwrap_or(defaults.size),
        )
    }
}

#[derive(Serialize)]
pub(crate) struct MessageResponse {
    message: &'static str,
}

impl MessageResponse {
    pub(crate) fn new(message: &'static str) -> Self {
        Self { message }
    }
}

/// Create the API router.
///
/// Every route sits behind the identity middleware, so handlers only have to
/// look in the request extensions.
pub fn create_api_router(
    db: Database,
    auth: AuthService,
    rate_limit_config: Option<Arc<RateLimitConfig>>,
) -> Router {
    let auth_state = auth::AuthState {
        auth: auth.clone(),
        rate_limit_config,
    };

    let users_state = users::UsersState {
        db: db.clone(),
        hasher: auth.hasher().clone(),
    };

    let articles_state = articles::ArticlesState { db: db.clone() };

    let comments_state = comments::CommentsState { db };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/articles", articles::router(articles_state))
        .nest("/comments", comments::router(comments_state))
        .nest("/users", users::router(users_state))
        .layer(middleware::from_fn_with_state(
            auth,
            identity_middleware::<AuthService>,
        ))
}
