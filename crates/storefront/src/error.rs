//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::commerce::CommerceError;
use crate::content::ContentError;
use crate::models::CartError;
use crate::reminders::ReminderError;
use crate::reminders::sync::SyncError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Commerce API operation failed.
    #[error("Commerce error: {0}")]
    Commerce(#[from] CommerceError),

    /// Content API operation failed.
    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    /// Reminder sync failed or is unavailable.
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Reminder input or lookup failed.
    #[error("Reminder error: {0}")]
    Reminder(#[from] ReminderError),

    /// Cart mutation rejected.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Commerce(CommerceError::NotFound(_))
            | Self::Content(ContentError::NotFound(_))
            | Self::Reminder(ReminderError::NotFound(_))
            | Self::Cart(CartError::LineNotFound)
            | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Commerce(CommerceError::RateLimited(_)) | Self::RateLimited => {
                StatusCode::TOO_MANY_REQUESTS
            }
            Self::Commerce(_) | Self::Content(_) => StatusCode::BAD_GATEWAY,
            Self::Sync(SyncError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Sync(_) => StatusCode::BAD_GATEWAY,
            Self::Reminder(_) | Self::Cart(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the client.
    fn public_message(&self) -> String {
        match self {
            Self::Session(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Commerce(CommerceError::NotFound(_)) | Self::Content(ContentError::NotFound(_)) => {
                "Not found".to_string()
            }
            Self::Commerce(CommerceError::RateLimited(_)) | Self::RateLimited => {
                "Too many requests, please try again shortly".to_string()
            }
            Self::Commerce(_) | Self::Content(_) | Self::Sync(SyncError::Http(_) | SyncError::Api { .. } | SyncError::Parse(_)) => {
                "External service error".to_string()
            }
            Self::Sync(SyncError::NotConfigured) => "Reminder sync is unavailable".to_string(),
            Self::Reminder(err) => err.to_string(),
            Self::Cart(err) => err.to_string(),
            _ => self.to_string(),
        }
    }

    /// Whether the error is the server's (or an upstream's) fault.
    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Session(_)
                | Self::Internal(_)
                | Self::Commerce(
                    CommerceError::Http(_) | CommerceError::Api { .. } | CommerceError::Parse(_)
                )
                | Self::Content(ContentError::Http(_) | ContentError::Api { .. } | ContentError::Parse(_))
                | Self::Sync(SyncError::Http(_) | SyncError::Api { .. } | SyncError::Parse(_))
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (self.status(), self.public_message()).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context after a customer logs in.
pub fn set_sentry_user(email: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            email: Some(email.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the customer.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upstream_error_status_codes() {
        assert_eq!(
            get_status(CommerceError::NotFound("product".to_string()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(CommerceError::RateLimited(5).into()),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(
                CommerceError::Api {
                    status: 500,
                    message: "boom".to_string()
                }
                .into()
            ),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(SyncError::NotConfigured.into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_domain_error_status_codes() {
        assert_eq!(
            get_status(ReminderError::EmptyMedication.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(ReminderError::NotFound(uuid::Uuid::nil()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(CartError::OutOfStock.into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_internal_details_not_exposed() {
        let err = AppError::Commerce(CommerceError::Api {
            status: 401,
            message: "consumer key ck_live_123 invalid".to_string(),
        });
        assert_eq!(err.public_message(), "External service error");

        let err = AppError::Internal("pool exhausted".to_string());
        assert_eq!(err.public_message(), "Internal server error");

        let err = AppError::Reminder(ReminderError::NoTimes);
        assert_eq!(err.public_message(), "At least one reminder time is required");
    }
}
