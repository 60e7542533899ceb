//! Permanent redirects from the old storefront's URL scheme.

use axum::{
    Router,
    extract::{Path, RawQuery},
    response::Redirect,
    routing::get,
};

use crate::state::AppState;

/// Legacy redirect routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/shop", get(shop))
        .route("/product/{slug}", get(product))
        .route("/product-category/{*path}", get(category))
        .route("/product-tag/{slug}", get(tag))
        .route("/my-account", get(my_account))
}

/// `/shop` keeps its query (`?orderby=` etc.) on the way to `/products`.
async fn shop(RawQuery(query): RawQuery) -> Redirect {
    match query.filter(|q| !q.is_empty()) {
        Some(q) => Redirect::permanent(&format!("/products?{q}")),
        None => Redirect::permanent("/products"),
    }
}

async fn product(Path(slug): Path<String>) -> Redirect {
    Redirect::permanent(&format!("/products/{}", urlencoding::encode(&slug)))
}

/// Nested category paths (`/product-category/medicine/pain`) map to the
/// innermost category.
async fn category(Path(path): Path<String>) -> Redirect {
    match last_segment(&path) {
        Some(slug) => Redirect::permanent(&format!("/categories/{}", urlencoding::encode(slug))),
        None => Redirect::permanent("/categories"),
    }
}

async fn tag(Path(slug): Path<String>) -> Redirect {
    Redirect::permanent(&format!("/tags/{}", urlencoding::encode(&slug)))
}

async fn my_account() -> Redirect {
    Redirect::permanent("/account/login")
}

fn last_segment(path: &str) -> Option<&str> {
    path.split('/').rev().find(|s| !s.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::routes::tests::{get_request, test_app};
    use axum::http::{StatusCode, header};
    use tower::ServiceExt;

    async fn location(uri: &str) -> String {
        let response = test_app().oneshot(get_request(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("medicine/pain/"), Some("pain"));
        assert_eq!(last_segment("vitamins"), Some("vitamins"));
        assert_eq!(last_segment("/"), None);
    }

    #[tokio::test]
    async fn test_legacy_redirects() {
        assert_eq!(location("/shop").await, "/products");
        assert_eq!(location("/shop?orderby=price").await, "/products?orderby=price");
        assert_eq!(location("/product/ibuprofen-400").await, "/products/ibuprofen-400");
        assert_eq!(
            location("/product-category/medicine/pain").await,
            "/categories/pain"
        );
        assert_eq!(location("/product-tag/vegan").await, "/tags/vegan");
        assert_eq!(location("/my-account").await, "/account/login");
    }
}
