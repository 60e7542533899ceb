//! Reminder sync endpoints.
//!
//! JSON wrappers around the sync table for clients that keep their
//! reminders elsewhere (a native app, another browser). The user is the
//! authenticated customer: a commerce bearer token, or the logged-in
//! session when no token is sent. Rows are validated before they are
//! written.

use axum::{Json, extract::State, http::HeaderMap};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::AppError;
use crate::models::session::current_customer;
use crate::reminders::sync::{MAX_BATCH, RemoteReminder};
use crate::routes::api::ApiError;
use crate::routes::api::auth::bearer_token;
use crate::state::AppState;

/// Upsert request body.
#[derive(Debug, Deserialize)]
pub struct PushRequest {
    #[serde(default)]
    pub reminders: Vec<RemoteReminder>,
}

/// Upsert response body.
#[derive(Debug, Serialize)]
pub struct PushResponse {
    pub synced: usize,
}

/// Fetch response body.
#[derive(Debug, Serialize)]
pub struct FetchResponse {
    pub reminders: Vec<RemoteReminder>,
}

/// The sync user id of the caller.
///
/// A bearer token wins over the session. An invalid token is a 401 even
/// when a session customer exists.
async fn sync_user(
    state: &AppState,
    session: &Session,
    headers: &HeaderMap,
) -> Result<String, ApiError> {
    if let Some(token) = bearer_token(headers) {
        return match state.commerce().token_email(token).await {
            Ok(Some(email)) => Ok(email.as_str().to_string()),
            Ok(None) => Err(ApiError::unauthorized("invalid token")),
            Err(e) => Err(AppError::from(e).into()),
        };
    }

    current_customer(session)
        .await
        .map(|customer| customer.sync_user_id().to_string())
        .ok_or_else(|| ApiError::unauthorized("authentication required"))
}

/// Check a push request before anything is sent upstream.
///
/// Rows may omit `user_id`; a row naming another user is refused.
fn validate_push(request: &PushRequest, user_id: &str) -> Result<(), ApiError> {
    if request.reminders.len() > MAX_BATCH {
        return Err(ApiError::bad_request(format!(
            "at most {MAX_BATCH} reminders per request"
        )));
    }
    for row in &request.reminders {
        if !row.user_id.is_empty() && !row.user_id.eq_ignore_ascii_case(user_id) {
            return Err(ApiError::forbidden(format!(
                "reminder {} belongs to another user",
                row.id
            )));
        }
        row.clone()
            .into_reminder()
            .map_err(|e| ApiError::bad_request(format!("reminder {}: {e}", row.id)))?;
    }
    Ok(())
}

/// `POST /api/reminders/sync`
///
/// # Errors
///
/// Returns 401 without valid credentials, 403 for rows naming another
/// user, 400 for an oversized batch or an invalid row, 503 if sync is not
/// configured, 502 if the sync service fails.
#[instrument(skip(state, session, headers, request), fields(rows = request.reminders.len()))]
pub async fn push(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Json(request): Json<PushRequest>,
) -> Result<Json<PushResponse>, ApiError> {
    let user_id = sync_user(&state, &session, &headers).await?;
    validate_push(&request, &user_id)?;
    let sync = state.sync().map_err(AppError::from)?;

    let synced = sync
        .upsert(&user_id, &request.reminders)
        .await
        .map_err(AppError::from)?;
    Ok(Json(PushResponse { synced }))
}

/// `GET /api/reminders/sync`
///
/// # Errors
///
/// Returns 401 without valid credentials, 503 if sync is not configured,
/// 502 if the sync service fails.
#[instrument(skip(state, session, headers))]
pub async fn fetch(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
) -> Result<Json<FetchResponse>, ApiError> {
    let user_id = sync_user(&state, &session, &headers).await?;
    let sync = state.sync().map_err(AppError::from)?;

    let reminders = sync.fetch(&user_id).await.map_err(AppError::from)?;
    Ok(Json(FetchResponse { reminders }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::routes::tests::{
        body_string, get_request, logged_in_cookie, test_app, test_app_with_store,
    };
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use serde_json::json;
    use tower::ServiceExt;
    use tower_sessions::MemoryStore;

    fn row(times: &[&str], user_id: Option<&str>) -> RemoteReminder {
        let mut value = json!({
            "id": "6f1c2a8e-3b7d-4c5e-9f10-2a3b4c5d6e7f",
            "medication": "Metformin",
            "times": times,
            "start_date": "2026-01-01",
            "updated_at": "2026-01-02T08:00:00Z"
        });
        if let Some(user_id) = user_id {
            value["user_id"] = json!(user_id);
        }
        serde_json::from_value(value).unwrap()
    }

    fn push_request(reminders: Vec<RemoteReminder>) -> PushRequest {
        PushRequest { reminders }
    }

    fn json_post(body: &serde_json::Value, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/reminders/sync")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[test]
    fn test_validate_push() {
        let user = "ana@example.com";
        assert!(validate_push(&push_request(vec![row(&["08:00"], None)]), user).is_ok());
        let own_row = row(&["08:00"], Some("Ana@Example.com"));
        assert!(validate_push(&push_request(vec![own_row]), user).is_ok());

        let err = validate_push(&push_request(vec![row(&["25:00"], None)]), user).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.error.contains("Invalid time"));

        let too_many = vec![row(&["08:00"], None); MAX_BATCH + 1];
        assert!(validate_push(&push_request(too_many), user).is_err());
    }

    #[test]
    fn test_validate_push_refuses_other_users_rows() {
        let request = push_request(vec![row(&["08:00"], Some("victim@example.com"))]);
        let err = validate_push(&request, "ana@example.com").unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_anonymous_fetch_is_unauthorized() {
        let response = test_app()
            .oneshot(get_request(
                "/api/reminders/sync?user_id=victim@example.com",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(!body_string(response).await.contains("victim"));
    }

    #[tokio::test]
    async fn test_anonymous_push_is_unauthorized() {
        let body = json!({ "user_id": "victim@example.com", "reminders": [] });
        let response = test_app().oneshot(json_post(&body, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bearer_token_is_checked_upstream() {
        let request = Request::builder()
            .uri("/api/reminders/sync")
            .header(header::AUTHORIZATION, "Bearer forged")
            .body(Body::empty())
            .unwrap();
        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_session_customer_cannot_push_for_another_user() {
        let store = MemoryStore::default();
        let cookie = logged_in_cookie(&store, "ana@example.com").await;
        let app = test_app_with_store(store);

        let body = json!({
            "reminders": [{
                "id": "6f1c2a8e-3b7d-4c5e-9f10-2a3b4c5d6e7f",
                "user_id": "victim@example.com",
                "medication": "Sertraline",
                "times": ["08:00"],
                "start_date": "2026-01-01",
                "updated_at": "2026-01-02T08:00:00Z"
            }]
        });
        let response = app.oneshot(json_post(&body, Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_session_customer_without_sync_is_unavailable() {
        let store = MemoryStore::default();
        let cookie = logged_in_cookie(&store, "ana@example.com").await;
        let app = test_app_with_store(store);

        let response = app
            .clone()
            .oneshot(json_post(&json!({ "reminders": [] }), Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = app
            .oneshot(get_request("/api/reminders/sync", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
