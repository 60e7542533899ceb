//! Account route handlers.
//!
//! Login goes through the commerce backend's JWT endpoint. The returned
//! token and identity are kept in the session; nothing is stored locally.

use apoteka_core::Email;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::commerce::{ProxiedResponse, TokenRequest};
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::OptionalCustomer;
use crate::models::{CurrentCustomer, session_keys};
use crate::routes::Layout;
use crate::state::AppState;

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Query parameters for error display.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub error: Option<String>,
}

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub error: Option<&'static str>,
}

fn error_message(code: Option<&str>) -> Option<&'static str> {
    match code? {
        "invalid" => Some("Invalid email or password."),
        "unavailable" => Some("Login is temporarily unavailable. Please try again."),
        _ => None,
    }
}

/// Customer identity from a successful token response.
///
/// The email falls back to the one typed into the form when the backend
/// omits it.
fn customer_from_token(body: &serde_json::Value, typed_email: &str) -> Option<CurrentCustomer> {
    let token = body.get("token")?.as_str()?.trim();
    if token.is_empty() {
        return None;
    }

    let email = body
        .get("user_email")
        .and_then(serde_json::Value::as_str)
        .and_then(|e| Email::parse(e).ok())
        .or_else(|| Email::parse(typed_email).ok())?;

    let display_name = body
        .get("user_display_name")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map_or_else(|| email.as_str().to_string(), ToString::to_string);

    Some(CurrentCustomer {
        email,
        display_name,
        token: token.to_string(),
    })
}

/// Display the login page, or send logged-in customers to their reminders.
#[instrument(skip(layout, customer))]
pub async fn login_page(
    Query(query): Query<LoginQuery>,
    OptionalCustomer(customer): OptionalCustomer,
    layout: Layout,
) -> Response {
    if customer.is_some() {
        return Redirect::to("/reminders").into_response();
    }
    LoginTemplate {
        layout,
        error: error_message(query.error.as_deref()),
    }
    .into_response()
}

/// Handle login form submission.
///
/// # Errors
///
/// Returns 500 if the session store fails.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let request = TokenRequest {
        username: form.email.trim().to_string(),
        password: form.password,
    };

    let customer = match state.commerce().request_token(&request).await {
        Ok(ProxiedResponse { status, body }) if (200..300).contains(&status) => {
            customer_from_token(&body, &request.username)
        }
        Ok(ProxiedResponse { status, .. }) => {
            tracing::info!(status, "Login rejected by auth endpoint");
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "Auth endpoint unreachable");
            return Ok(Redirect::to("/account/login?error=unavailable").into_response());
        }
    };

    let Some(customer) = customer else {
        return Ok(Redirect::to("/account/login?error=invalid").into_response());
    };

    session.cycle_id().await?;
    set_sentry_user(customer.email.as_str());
    crate::models::session::save(&session, session_keys::CURRENT_CUSTOMER, &customer).await?;
    tracing::info!("Customer logged in");

    Ok(Redirect::to("/reminders").into_response())
}

/// Handle logout. Cart, wishlist and reminders stay in the session.
///
/// # Errors
///
/// Returns 500 if the session store fails.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<impl IntoResponse> {
    session
        .remove::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
        .await?;
    clear_sentry_user();
    Ok(Redirect::to("/"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::routes::tests::{body_string, form_post, get_request, test_app};
    use axum::http::{StatusCode, header};
    use serde_json::json;
    use tower::ServiceExt;

    #[test]
    fn test_customer_from_token() {
        let body = json!({
            "token": "eyJ.abc.def",
            "user_email": "Ana@Example.com",
            "user_display_name": "Ana"
        });
        let customer = customer_from_token(&body, "ignored@example.com").unwrap();
        assert_eq!(customer.display_name, "Ana");
        assert_eq!(customer.token, "eyJ.abc.def");
        assert_eq!(customer.sync_user_id(), "ana@example.com");
    }

    #[test]
    fn test_customer_from_token_falls_back_to_typed_email() {
        let body = json!({ "token": "t" });
        let customer = customer_from_token(&body, "ana@example.com").unwrap();
        assert_eq!(customer.display_name, "ana@example.com");
    }

    #[test]
    fn test_customer_from_token_requires_token() {
        assert!(customer_from_token(&json!({ "token": "" }), "ana@example.com").is_none());
        assert!(customer_from_token(&json!({ "code": "invalid_username" }), "a@b.co").is_none());
    }

    #[tokio::test]
    async fn test_login_page_shows_error() {
        let response = test_app()
            .oneshot(get_request("/account/login?error=invalid", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("Invalid email or password."));
    }

    #[tokio::test]
    async fn test_login_with_backend_down_redirects_with_error() {
        let response = test_app()
            .oneshot(form_post(
                "/account/login",
                "email=ana%40example.com&password=secret",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/account/login?error=unavailable"
        );
    }

    #[tokio::test]
    async fn test_logout_redirects_home() {
        let response = test_app()
            .oneshot(form_post("/account/logout", "", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
    }
}
