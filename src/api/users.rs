//! Account management.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use super::MessageResponse;
use super::error::{ApiError, ResultExt};
use super::validation;
use crate::auth::{AdminOnly, Auth, AuthError, authority, policy};
use crate::db::{Database, DuplicateKey, User, UserChanges, duplicate_key};
use crate::password::PasswordHasher;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub hasher: PasswordHasher,
}

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/", get(list_users))
        .route("/profile", get(profile))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
        .with_state(state)
}

/// An empty password means "keep the current one".
#[derive(Deserialize, Validate)]
struct UpdateUserRequest {
    #[serde(default, deserialize_with = "validation::trimmed_option")]
    #[validate(
        length(max = 100, message = "must be at most 100 characters"),
        email(message = "must be a well-formed email address")
    )]
    email: Option<String>,
    #[serde(default, deserialize_with = "validation::empty_as_none")]
    #[validate(length(min = 6, max = 60, message = "must be between 6 and 60 characters"))]
    password: Option<String>,
}

/// Public view of a user. Never carries the password hash.
#[derive(Serialize)]
struct UserResponse {
    id: i64,
    username: String,
    email: String,
    roles: Vec<String>,
    created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            roles: user.roles.iter().map(|role| authority(role)).collect(),
            username: user.username,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

async fn load_user(db: &Database, id: i64) -> Result<User, ApiError> {
    db.users()
        .get_by_id(id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found(format!("User {id} not found")))
}

async fn profile(
    State(state): State<UsersState>,
    Auth(identity): Auth,
) -> Result<impl IntoResponse, ApiError> {
    // The account may have been deleted since the token was resolved.
    let user = state
        .db
        .users()
        .get_by_id(identity.id)
        .await
        .db_err("Failed to get user")?
        .ok_or(AuthError::Unauthenticated)?;
    Ok(Json(UserResponse::from(user)))
}

async fn list_users(
    State(state): State<UsersState>,
    AdminOnly(_): AdminOnly,
) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .db
        .users()
        .list_all()
        .await
        .db_err("Failed to list users")?;
    Ok(Json(
        users
            .into_iter()
            .map(UserResponse::from)
            .collect::<Vec<_>>(),
    ))
}

async fn get_user(
    State(state): State<UsersState>,
    Auth(identity): Auth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    policy::require_owner_or_admin(Some(&identity), id)?;
    Ok(Json(UserResponse::from(load_user(&state.db, id).await?)))
}

async fn update_user(
    State(state): State<UsersState>,
    Auth(identity): Auth,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;
    policy::require_owner_or_admin(Some(&identity), id)?;
    let user = load_user(&state.db, id).await?;
    let users = state.db.users();

    // Exact comparison so a case-only change is applied.
    let email = payload.email.as_deref().filter(|email| *email != user.email);
    if let Some(email) = email {
        if users
            .email_in_use_by_other(email, id)
            .await
            .db_err("Failed to check email")?
        {
            return Err(AuthError::DuplicateEmail.into());
        }
    }

    // Hash before writing anything so a failure leaves the account untouched.
    let password_hash = match payload.password {
        Some(password) => Some(
            state
                .hasher
                .hash_blocking(password)
                .await
                .map_err(AuthError::from)?,
        ),
        None => None,
    };

    let changes = UserChanges {
        email,
        password_hash: password_hash.as_deref(),
    };
    match users.update(id, &changes).await {
        Ok(true) => {}
        Ok(false) => return Err(ApiError::not_found(format!("User {id} not found"))),
        Err(e) => {
            return Err(match duplicate_key(&e) {
                Some(DuplicateKey::Email) => AuthError::DuplicateEmail.into(),
                _ => ApiError::db_error("Failed to update user", e),
            });
        }
    }

    info!(user_id = id, by = %identity.username, "User updated");

    Ok(Json(UserResponse::from(load_user(&state.db, id).await?)))
}

async fn delete_user(
    State(state): State<UsersState>,
    AdminOnly(admin): AdminOnly,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .users()
        .delete(id)
        .await
        .db_err("Failed to delete user")?;
    if !deleted {
        return Err(ApiError::not_found(format!("User {id} not found")));
    }

    info!(user_id = id, by = %admin.username, "User deleted");
    Ok(Json(MessageResponse::new("User deleted")))
}
