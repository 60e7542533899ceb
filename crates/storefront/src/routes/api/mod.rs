//! JSON API routes.
//!
//! Login-adjacent endpoints share the strict auth limiter, sync endpoints
//! the looser API limiter.

pub mod auth;
pub mod reminder_sync;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Error body for API endpoints.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            error: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl From<crate::error::AppError> for ApiError {
    fn from(err: crate::error::AppError) -> Self {
        let status = err.status();
        if status.is_server_error() {
            tracing::error!(error = %err, "API request failed");
        }
        let message = match status {
            StatusCode::SERVICE_UNAVAILABLE => "Reminder sync is unavailable",
            StatusCode::BAD_GATEWAY => "External service error",
            s if s.is_server_error() => "Internal server error",
            _ => return Self::new(status, err.to_string()),
        };
        Self::new(status, message)
    }
}

/// Create the `/api` router.
pub fn routes() -> Router<AppState> {
    let auth = Router::new()
        .route("/auth/token", post(auth::token))
        .route("/auth/token/validate", post(auth::validate))
        .route_layer(auth_rate_limiter());

    let sync = Router::new()
        .route(
            "/reminders/sync",
            post(reminder_sync::push).get(reminder_sync::fetch),
        )
        .route_layer(api_rate_limiter());

    Router::new().merge(auth).merge(sync)
}
