//! Integration tests for medication reminders and the JSON API.
//!
//! These tests require the storefront running (cargo run -p apoteka-storefront).
//! Sync tests additionally need the commerce backend, the sync service and
//! `TEST_CUSTOMER_EMAIL` / `TEST_CUSTOMER_PASSWORD`.

use apoteka_integration_tests::{client, location, required_env, storefront_url};
use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_reminder_create_and_list() {
    let client = client();
    let base_url = storefront_url();

    let resp = client
        .post(format!("{base_url}/reminders"))
        .form(&[
            ("medication", "Metformin"),
            ("dosage", "500 mg"),
            ("times", "08:00, 20:00"),
            ("days", ""),
            ("notes", "With food"),
        ])
        .send()
        .await
        .expect("Failed to create reminder");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/reminders?notice=created");

    let resp = client
        .get(format!("{base_url}/reminders"))
        .send()
        .await
        .expect("Failed to get reminders");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.expect("Failed to read body");
    assert!(body.contains("Metformin"));
    assert!(body.contains("08:00"));
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_reminder_rejects_bad_times() {
    let resp = client()
        .post(format!("{}/reminders", storefront_url()))
        .form(&[("medication", "Metformin"), ("times", "25:00"), ("days", "")])
        .send()
        .await
        .expect("Failed to post reminder");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_sync_pages_require_login() {
    let resp = client()
        .post(format!("{}/reminders/sync/push", storefront_url()))
        .send()
        .await
        .expect("Failed to post sync push");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/account/login");
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_api_validate_without_bearer_is_unauthorized() {
    let resp = client()
        .post(format!("{}/api/auth/token/validate", storefront_url()))
        .send()
        .await
        .expect("Failed to post validate");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["error"], "missing bearer token");
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_api_sync_without_credentials_is_unauthorized() {
    let client = client();
    let base_url = storefront_url();

    let resp = client
        .get(format!("{base_url}/api/reminders/sync"))
        .query(&[("user_id", "someone@example.com")])
        .send()
        .await
        .expect("Failed to fetch reminders");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .post(format!("{base_url}/api/reminders/sync"))
        .json(&json!({ "user_id": "someone@example.com", "reminders": [] }))
        .send()
        .await
        .expect("Failed to push reminders");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running storefront, commerce backend and reminder sync service"]
async fn test_api_sync_push_then_fetch() {
    let client = client();
    let base_url = storefront_url();
    let id = Uuid::new_v4();

    let resp = client
        .post(format!("{base_url}/api/auth/token"))
        .json(&json!({
            "username": required_env("TEST_CUSTOMER_EMAIL"),
            "password": required_env("TEST_CUSTOMER_PASSWORD"),
        }))
        .send()
        .await
        .expect("Failed to request token");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Failed to parse JSON");
    let token = body["token"].as_str().expect("token string").to_string();

    let resp = client
        .post(format!("{base_url}/api/reminders/sync"))
        .bearer_auth(&token)
        .json(&json!({
            "reminders": [{
                "id": id,
                "medication": "Vitamin D3",
                "dosage": "1000 IU",
                "times": ["09:00"],
                "days": [],
                "start_date": "2026-01-01",
                "end_date": null,
                "notes": "",
                "active": true,
                "product_id": null,
                "updated_at": "2026-01-01T09:00:00Z"
            }]
        }))
        .send()
        .await
        .expect("Failed to push reminders");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["synced"], 1);

    let resp = client
        .get(format!("{base_url}/api/reminders/sync"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to fetch reminders");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Failed to parse JSON");
    let reminders = body["reminders"].as_array().expect("reminders array");
    assert!(reminders.iter().any(|r| r["id"] == json!(id)));
}

#[tokio::test]
#[ignore = "Requires running storefront, commerce backend and reminder sync service"]
async fn test_login_then_sync_push() {
    let client = client();
    let base_url = storefront_url();
    let email = required_env("TEST_CUSTOMER_EMAIL");
    let password = required_env("TEST_CUSTOMER_PASSWORD");

    let resp = client
        .post(format!("{base_url}/account/login"))
        .form(&[("email", email.as_str()), ("password", password.as_str())])
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/reminders");

    let resp = client
        .post(format!("{base_url}/reminders/sync/push"))
        .send()
        .await
        .expect("Failed to push");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert!(location(&resp).starts_with("/reminders?notice=pushed"));
}
