//! Wishlist route handlers.

use apoteka_core::ProductId;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::{HeaderMap, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::catalog::{ProductView, map_products};
use crate::commerce::ProductQuery;
use crate::error::Result;
use crate::filters;
use crate::models::{Wishlist, session_keys};
use crate::routes::{Layout, is_fragment_request, or_empty};
use crate::state::AppState;

/// Toggle form data.
#[derive(Debug, Deserialize)]
pub struct ToggleForm {
    pub product_id: ProductId,
}

/// Wishlist page template.
#[derive(Template, WebTemplate)]
#[template(path = "wishlist/show.html")]
pub struct WishlistShowTemplate {
    pub layout: Layout,
    pub products: Vec<ProductView>,
}

/// Heart button fragment (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/wishlist_button.html")]
pub struct WishlistButtonTemplate {
    pub product_id: ProductId,
    pub wishlisted: bool,
}

async fn load_wishlist(session: &Session) -> Result<Wishlist> {
    Ok(crate::models::session::load(session, session_keys::WISHLIST).await?)
}

/// Display the wishlist, newest first.
///
/// Products that no longer exist are left out.
///
/// # Errors
///
/// Returns 500 if the session store fails.
#[instrument(skip(state, session, layout))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    layout: Layout,
) -> Result<WishlistShowTemplate> {
    let wishlist = load_wishlist(&session).await?;
    if wishlist.is_empty() {
        return Ok(WishlistShowTemplate {
            layout,
            products: Vec::new(),
        });
    }

    let ids: Vec<ProductId> = wishlist.ids().iter().rev().copied().collect();
    let query = ProductQuery {
        per_page: u32::try_from(ids.len()).unwrap_or(ProductQuery::MAX_PER_PAGE),
        include: ids.clone(),
        ..ProductQuery::default()
    };
    let page = or_empty(state.commerce().list_products(&query).await, "wishlist");
    let mut products = map_products(&page.products, state.currency());
    products.sort_by_key(|p| ids.iter().position(|id| *id == p.id));

    Ok(WishlistShowTemplate { layout, products })
}

/// Add or remove a product.
///
/// # Errors
///
/// Returns 500 if the session store fails.
#[instrument(skip(session, headers))]
pub async fn toggle(
    session: Session,
    headers: HeaderMap,
    Form(form): Form<ToggleForm>,
) -> Result<Response> {
    let mut wishlist = load_wishlist(&session).await?;
    let wishlisted = wishlist.toggle(form.product_id);
    crate::models::session::save(&session, session_keys::WISHLIST, &wishlist).await?;

    if is_fragment_request(&headers) {
        return Ok(WishlistButtonTemplate {
            product_id: form.product_id,
            wishlisted,
        }
        .into_response());
    }

    let back = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .and_then(same_site_path)
        .unwrap_or_else(|| "/wishlist".to_string());
    Ok(Redirect::to(&back).into_response())
}

/// Path and query of a referer, only if it is a local path.
fn same_site_path(referer: &str) -> Option<String> {
    if referer.starts_with('/') && !referer.starts_with("//") {
        return Some(referer.to_string());
    }
    let url = url::Url::parse(referer).ok()?;
    let mut path = url.path().to_string();
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }
    Some(path)
}
