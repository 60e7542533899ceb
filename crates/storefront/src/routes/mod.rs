//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                           - Home page
//!
//! # Catalog
//! GET  /products                   - Product listing (?page&sort&category&tag&q)
//! GET  /products/{slug}            - Product detail with variations and cross-sell
//! GET  /categories                 - Category tree and attribute index
//! GET  /categories/{slug}          - Category listing
//! GET  /tags/{slug}                - Tag listing
//! GET  /search                     - Product search (?q&page)
//!
//! # Content
//! GET  /blog                       - Post listing (?page)
//! GET  /blog/{slug}                - Post detail
//! GET  /pages/{slug}               - Static page
//!
//! # Cart (HTMX fragments)
//! GET  /cart                       - Cart page
//! POST /cart/add                   - Add item (returns count badge, triggers cart-updated)
//! POST /cart/update                - Set quantity (returns cart lines fragment)
//! POST /cart/remove                - Remove line (returns cart lines fragment)
//! GET  /cart/count                 - Cart count badge (fragment)
//! POST /checkout                   - Create pending order, redirect to payment
//!
//! # Wishlist
//! GET  /wishlist                   - Wishlist page
//! POST /wishlist/toggle            - Toggle a product (returns heart button fragment)
//!
//! # Medication reminders
//! GET  /reminders                  - Today's schedule, reminder list, adherence
//! POST /reminders                  - Create reminder
//! POST /reminders/{id}             - Update reminder
//! POST /reminders/{id}/delete      - Delete reminder
//! POST /reminders/{id}/active      - Pause or resume
//! POST /reminders/{id}/intake      - Record taken/skipped, or clear
//! POST /reminders/sync/push        - Upload the session book (requires login)
//! POST /reminders/sync/pull        - Merge remote reminders (requires login)
//!
//! # Account
//! GET  /account/login              - Login page
//! POST /account/login              - Login via commerce token endpoint
//! POST /account/logout             - Logout
//!
//! # JSON API
//! POST /api/auth/token             - Proxy to commerce token endpoint
//! POST /api/auth/token/validate    - Proxy token validation
//! POST /api/reminders/sync         - Upsert { reminders } (bearer token or login)
//! GET  /api/reminders/sync         - Fetch (bearer token or login)
//!
//! # Legacy redirects (308)
//! /shop, /product/{slug}, /product-category/{*path}, /product-tag/{slug}, /my-account
//! ```

pub mod account;
pub mod api;
pub mod blog;
pub mod cart;
pub mod categories;
pub mod home;
pub mod layout;
pub mod pages;
pub mod products;
pub mod redirects;
pub mod reminders;
pub mod search;
pub mod tags;
pub mod wishlist;

use std::fmt::Display;

use axum::{
    Router,
    http::HeaderMap,
    routing::{get, post},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

pub use layout::Layout;

/// Catch-and-log for page sections: a failed upstream call renders as an
/// empty section instead of an error page.
pub(crate) fn or_empty<T: Default, E: Display>(result: Result<T, E>, section: &str) -> T {
    result.unwrap_or_else(|e| {
        tracing::warn!(section = %section, error = %e, "Section unavailable, rendering empty");
        T::default()
    })
}

/// Whether the request came from an HTMX-style fragment swap.
pub(crate) fn is_fragment_request(headers: &HeaderMap) -> bool {
    headers
        .get("hx-request")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "true")
}

/// Deserialize empty form values as `None` for optional parsed fields.
pub(crate) fn empty_string_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: Display,
{
    let s: Option<String> = serde::Deserialize::deserialize(deserializer)?;
    match s.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// A 1-based page number from the query string.
pub(crate) fn page_or_first(page: Option<u32>) -> u32 {
    page.unwrap_or(1).max(1)
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{slug}", get(products::show))
}

/// Create the category routes router.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::index))
        .route("/{slug}", get(categories::show))
}

/// Create the blog routes router.
pub fn blog_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(blog::index))
        .route("/{slug}", get(blog::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    let mutations = Router::new()
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route_layer(api_rate_limiter());

    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .merge(mutations)
}

/// Create the wishlist routes router.
pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(wishlist::show))
        .route("/toggle", post(wishlist::toggle))
}

/// Create the reminder routes router.
pub fn reminder_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(reminders::index).post(reminders::create))
        .route("/{id}", post(reminders::update))
        .route("/{id}/delete", post(reminders::delete))
        .route("/{id}/active", post(reminders::set_active))
        .route("/{id}/intake", post(reminders::intake))
        .route("/sync/push", post(reminders::sync_push))
        .route("/sync/pull", post(reminders::sync_pull))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    let login = Router::new()
        .route("/login", post(account::login))
        .route_layer(auth_rate_limiter());

    Router::new()
        .route("/login", get(account::login_page))
        .route("/logout", post(account::logout))
        .merge(login)
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/products", product_routes())
        .nest("/categories", category_routes())
        .route("/tags/{slug}", get(tags::show))
        .route("/search", get(search::search))
        .nest("/blog", blog_routes())
        .route("/pages/{slug}", get(pages::show))
        .nest("/cart", cart_routes())
        .route("/checkout", post(cart::checkout))
        .nest("/wishlist", wishlist_routes())
        .nest("/reminders", reminder_routes())
        .nest("/account", account_routes())
        .nest("/api", api::routes())
        .merge(redirects::routes())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
        response::Response,
    };
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;
    use tower_sessions::session::{Id, Record};
    use tower_sessions::{MemoryStore, SessionStore, session_store};

    use crate::config::tests::test_config;

    /// The full application over an in-memory session store and a pool that
    /// never connects.
    pub(crate) fn test_app() -> Router {
        test_app_with_store(MemoryStore::default())
    }

    pub(crate) fn test_app_with_store<S: SessionStore + Clone>(store: S) -> Router {
        let config = test_config();
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/apoteka_test")
            .unwrap();
        let state = AppState::new(config, pool);
        crate::app(state, store)
    }

    /// A memory store whose next `load` fails once `fail_next_load` is set.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct FlakyStore {
        inner: MemoryStore,
        pub(crate) fail_next_load: Arc<AtomicBool>,
    }

    #[async_trait::async_trait]
    impl SessionStore for FlakyStore {
        async fn create(&self, record: &mut Record) -> session_store::Result<()> {
            self.inner.create(record).await
        }

        async fn save(&self, record: &Record) -> session_store::Result<()> {
            self.inner.save(record).await
        }

        async fn load(&self, id: &Id) -> session_store::Result<Option<Record>> {
            if self.fail_next_load.swap(false, Ordering::SeqCst) {
                return Err(session_store::Error::Backend("connection reset".to_string()));
            }
            self.inner.load(id).await
        }

        async fn delete(&self, id: &Id) -> session_store::Result<()> {
            self.inner.delete(id).await
        }
    }

    pub(crate) async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// The session cookie from a response, ready to send back.
    pub(crate) fn session_cookie(response: &Response) -> String {
        response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .unwrap()
            .to_string()
    }

    pub(crate) fn form_post(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    pub(crate) fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    /// Store a session with `email` logged in and return its cookie.
    pub(crate) async fn logged_in_cookie<S: SessionStore>(store: &S, email: &str) -> String {
        use crate::models::session::{CurrentCustomer, keys};
        use tower_sessions::cookie::time::{Duration, OffsetDateTime};

        let customer = CurrentCustomer {
            email: apoteka_core::Email::parse(email).unwrap(),
            display_name: "Test Customer".to_string(),
            token: "session-token".to_string(),
        };
        let mut record = Record {
            id: Id::default(),
            data: std::collections::HashMap::from([(
                keys::CURRENT_CUSTOMER.to_string(),
                serde_json::to_value(&customer).unwrap(),
            )]),
            expiry_date: OffsetDateTime::now_utc() + Duration::days(1),
        };
        store.create(&mut record).await.unwrap();
        format!("apoteka_session={}", record.id)
    }

    #[test]
    fn test_or_empty() {
        let ok: Result<Vec<u32>, String> = Ok(vec![1]);
        assert_eq!(or_empty(ok, "numbers"), vec![1]);
        let err: Result<Vec<u32>, String> = Err("boom".to_string());
        assert!(or_empty(err, "numbers").is_empty());
    }

    #[test]
    fn test_is_fragment_request() {
        let mut headers = HeaderMap::new();
        assert!(!is_fragment_request(&headers));
        headers.insert("hx-request", "true".parse().unwrap());
        assert!(is_fragment_request(&headers));
    }

    #[test]
    fn test_page_or_first() {
        assert_eq!(page_or_first(None), 1);
        assert_eq!(page_or_first(Some(0)), 1);
        assert_eq!(page_or_first(Some(4)), 4);
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app().oneshot(get_request("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "ok");
    }

    #[tokio::test]
    async fn test_security_headers_present() {
        let response = test_app().oneshot(get_request("/health", None)).await.unwrap();
        let headers = response.headers();
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert!(headers.get("x-request-id").is_some());
        let csp = headers
            .get(header::CONTENT_SECURITY_POLICY)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert!(csp.contains("'nonce-"));
        assert!(csp.contains("http://127.0.0.1:9"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = test_app()
            .oneshot(get_request("/definitely-not-here", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_home_renders_with_upstreams_down() {
        let response = test_app().oneshot(get_request("/", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("Apoteka"));
    }
}
