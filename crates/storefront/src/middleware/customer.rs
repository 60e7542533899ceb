//! Customer extractors.
//!
//! The logged-in customer lives in the session under
//! [`session_keys::CURRENT_CUSTOMER`](crate::models::session_keys::CURRENT_CUSTOMER).

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{CurrentCustomer, session_keys};

/// Extractor that requires a logged-in customer.
///
/// HTML requests without a customer are redirected to the login page,
/// `/api/*` requests get a bare 401.
///
/// # Example
///
/// ```rust,ignore
/// async fn push(RequireCustomer(customer): RequireCustomer) -> impl IntoResponse {
///     format!("Syncing for {}", customer.email)
/// }
/// ```
pub struct RequireCustomer(pub CurrentCustomer);

/// Extractor for pages that render differently when someone is logged in.
pub struct OptionalCustomer(pub Option<CurrentCustomer>);

/// Rejection for [`RequireCustomer`].
#[derive(Debug)]
pub enum CustomerRejection {
    /// Redirect to the login page (HTML requests).
    RedirectToLogin,
    /// Bare 401 (API requests or a missing session layer).
    Unauthorized,
}

impl IntoResponse for CustomerRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/account/login").into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

async fn session_customer(parts: &Parts) -> Option<CurrentCustomer> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
        .await
        .ok()
        .flatten()
}

impl<S> FromRequestParts<S> for RequireCustomer
where
    S: Send + Sync,
{
    type Rejection = CustomerRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(customer) = session_customer(parts).await {
            return Ok(Self(customer));
        }

        if parts.uri.path().starts_with("/api/") || parts.extensions.get::<Session>().is_none() {
            Err(CustomerRejection::Unauthorized)
        } else {
            Err(CustomerRejection::RedirectToLogin)
        }
    }
}

impl<S> FromRequestParts<S> for OptionalCustomer
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_customer(parts).await))
    }
}
