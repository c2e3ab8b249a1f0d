pub mod accounts;
pub mod assist;
pub mod oauth;
pub mod posts;
pub mod publish;

use axum::{
    Json, Router,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(accounts::routes())
        .merge(assist::routes())
        .merge(oauth::routes())
        .merge(posts::routes())
        .merge(publish::routes())
}

// ============================================================================
// Auth extractor
// ============================================================================

/// Extracts the caller's user id from the x-user-id header, falling back to
/// the default (demo) user when the header is absent.
pub struct AuthUser(pub i64);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match parts.headers.get("x-user-id") {
            Some(value) => value
                .to_str()
                .ok()
                .and_then(|v| v.parse().ok())
                .map(AuthUser)
                .ok_or(StatusCode::BAD_REQUEST),
            None => Ok(AuthUser(state.default_user_id)),
        }
    }
}

// ============================================================================
// Error responses
// ============================================================================

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Handler error: a bare status, or a status with a specific error message
/// in the body (validation failures surface their exact reason).
pub enum ApiError {
    Status(StatusCode),
    Message(StatusCode, String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::Message(StatusCode::BAD_REQUEST, message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::Message(StatusCode::NOT_FOUND, message.into())
    }
}

impl From<StatusCode> for ApiError {
    fn from(status: StatusCode) -> Self {
        ApiError::Status(status)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Status(status) => status.into_response(),
            ApiError::Message(status, error) => {
                (status, Json(ErrorBody { error })).into_response()
            }
        }
    }
}
