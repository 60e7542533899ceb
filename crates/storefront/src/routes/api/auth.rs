//! Token proxy.
//!
//! Relays credentials to the commerce backend's JWT endpoint so browsers
//! never talk to it directly. Upstream status and body pass through.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::instrument;

use crate::commerce::{ProxiedResponse, TokenRequest};
use crate::error::AppError;
use crate::routes::api::ApiError;
use crate::state::AppState;

fn relay(proxied: ProxiedResponse) -> Response {
    let status = StatusCode::from_u16(proxied.status).unwrap_or(StatusCode::BAD_GATEWAY);
    (status, Json(proxied.body)).into_response()
}

/// Bearer token from the `Authorization` header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// `POST /api/auth/token`
///
/// # Errors
///
/// Returns 400 for blank credentials, 502 if the backend is unreachable.
#[instrument(skip(state, request), fields(username = %request.username))]
pub async fn token(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Result<Response, ApiError> {
    if request.username.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("username and password are required"));
    }

    let proxied = state
        .commerce()
        .request_token(&request)
        .await
        .map_err(AppError::from)?;
    Ok(relay(proxied))
}

/// `POST /api/auth/token/validate`
///
/// # Errors
///
/// Returns 401 without a bearer token, 502 if the backend is unreachable.
#[instrument(skip(state, headers))]
pub async fn validate(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "missing bearer token"))?;

    let proxied = state
        .commerce()
        .validate_token(token)
        .await
        .map_err(AppError::from)?;
    Ok(relay(proxied))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::routes::tests::{body_string, test_app};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn json_post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());
        headers.insert(header::AUTHORIZATION, "Bearer ".parse().unwrap());
        assert!(bearer_token(&headers).is_none());
        headers.insert(header::AUTHORIZATION, "Bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }

    #[test]
    fn test_relay_keeps_upstream_status() {
        let response = relay(ProxiedResponse {
            status: 403,
            body: serde_json::json!({ "code": "[jwt_auth] incorrect_password" }),
        });
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_validate_without_token_is_unauthorized() {
        let response = test_app()
            .oneshot(json_post("/api/auth/token/validate", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_string(response).await.contains("missing bearer token"));
    }

    #[tokio::test]
    async fn test_blank_credentials_rejected() {
        let response = test_app()
            .oneshot(json_post(
                "/api/auth/token",
                r#"{"username":" ","password":"x"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_bad_gateway() {
        let response = test_app()
            .oneshot(json_post(
                "/api/auth/token",
                r#"{"username":"ana@example.com","password":"secret"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
