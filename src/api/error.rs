//! Shared error handling for API endpoints.
//!
//! Every failure leaves the API as
//! `{status, error, message, timestamp[, validation_errors]}`.

use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::auth::AuthError;

const INTERNAL_MESSAGE: &str = "An unexpected error occurred";

/// Extension trait for concise error mapping on Results.
pub trait ResultExt<T> {
    fn db_err(self, msg: &str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn db_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::db_error(msg, e))
    }
}

/// API error type with automatic response conversion.
#[derive(Debug)]
pub enum ApiError {
    /// Field name to message.
    Validation(BTreeMap<String, String>),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    TooManyRequests(String),
    /// The cause has already been logged; the client gets a generic message.
    Internal,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn too_many_requests(msg: impl Into<String>) -> Self {
        Self::TooManyRequests(msg.into())
    }

    pub fn db_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!(error = %e, "{}", context);
        Self::Internal
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::unauthorized("Invalid username or password"),
            AuthError::DuplicateUsername => Self::conflict("Username is already taken"),
            AuthError::DuplicateEmail => Self::conflict("Email is already in use"),
            AuthError::TokenExpired => Self::unauthorized("Token has expired"),
            AuthError::InvalidToken => Self::unauthorized("Invalid token"),
            AuthError::UserNotFound => Self::unauthorized("User not found"),
            AuthError::Unauthenticated => Self::unauthorized("Authentication required"),
            AuthError::Forbidden => {
                Self::forbidden("You do not have permission to perform this action")
            }
            AuthError::RoleNotConfigured(_)
            | AuthError::Storage(_)
            | AuthError::Password(_)
            | AuthError::Signing(_) => {
                error!(error = %err, "Request failed");
                Self::Internal
            }
        }
    }
}

/// One message per field: the first rule that failed.
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .filter_map(|(field, errors)| {
                let first = errors.first()?;
                let message = first
                    .message
                    .as_ref()
                    .map(|message| message.to_string())
                    .unwrap_or_else(|| format!("is invalid ({})", first.code));
                Some((field.to_string(), message))
            })
            .collect();
        Self::Validation(fields)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    status: u16,
    error: &'static str,
    message: String,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation_errors: Option<BTreeMap<String, String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let category = status.canonical_reason().unwrap_or("Error");
        let (error, message, validation_errors) = match self {
            ApiError::Validation(fields) => (
                "Validation Failed",
                "Request validation failed".to_string(),
                Some(fields),
            ),
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::TooManyRequests(msg) => (category, msg, None),
            ApiError::Internal => (category, INTERNAL_MESSAGE.to_string(), None),
        };

        let body = ErrorResponse {
            status: status.as_u16(),
            error,
            message,
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            validation_errors,
        };
        (status, Json(body)).into_response()
    }
}
