//! Black-box integration tests for the Apoteka storefront.
//!
//! The tests talk to a running server over HTTP and are `#[ignore]`d by
//! default.
//!
//! # Running Tests
//!
//! ```bash
//! cargo run -p apoteka-cli -- migrate
//! cargo run -p apoteka-storefront &
//! STOREFRONT_URL=http://localhost:3000 cargo test -p apoteka-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_URL` - server under test (default `http://localhost:3000`)
//! - `TEST_PRODUCT_ID` - an in-stock simple product, for cart flows
//! - `TEST_CUSTOMER_EMAIL` / `TEST_CUSTOMER_PASSWORD` - a commerce account, for sync flows

use reqwest::Client;

/// Base URL of the storefront under test.
#[must_use]
pub fn storefront_url() -> String {
    std::env::var("STOREFRONT_URL")
        .unwrap_or_else(|_| "http://localhost:3000".to_string())
        .trim_end_matches('/')
        .to_string()
}

/// A client that keeps cookies and does not follow redirects, so tests can
/// assert on `Location`.
///
/// # Panics
///
/// Panics if the TLS backend cannot be initialized.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// An environment variable the test cannot run without.
///
/// # Panics
///
/// Panics with the variable name if it is unset.
#[must_use]
pub fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| panic!("{key} must be set for this test"))
}

/// The `Location` header of a response, or an empty string.
#[must_use]
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
