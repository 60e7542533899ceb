//! Cart route handlers.
//!
//! The cart lives in the session. Mutations answer with HTMX fragments when
//! called from a fragment swap and redirect back to `/cart` otherwise.

use std::collections::HashMap;

use apoteka_core::{ProductId, VariationId};
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::HeaderMap,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use futures::future::join_all;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::catalog::{ProductView, VariationView, map_product, map_products, map_variation};
use crate::commerce::{CommerceError, OrderBilling, ProductQuery};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::models::session::current_customer;
use crate::models::{Cart, CartError, CartView, LineKey, session_keys};
use crate::routes::{Layout, empty_string_as_none, is_fragment_request};
use crate::state::AppState;

/// Event fired for fragments listening for cart changes.
const CART_UPDATED_TRIGGER: (&str, &str) = ("HX-Trigger", "cart-updated");

// =============================================================================
// Forms
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub variation_id: Option<VariationId>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub quantity: Option<u32>,
}

/// Update quantity form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: ProductId,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub variation_id: Option<VariationId>,
    pub quantity: u32,
}

/// Remove line form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: ProductId,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub variation_id: Option<VariationId>,
}

/// Cart page query parameters.
#[derive(Debug, Deserialize)]
pub struct CartPageQuery {
    pub error: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub layout: Layout,
    pub cart: CartView,
    pub error: Option<&'static str>,
}

/// Cart lines fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_lines.html")]
pub struct CartLinesTemplate {
    pub cart: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Message for a `?error=` code on the cart page.
fn error_message(code: Option<&str>) -> Option<&'static str> {
    match code? {
        "checkout" => Some("We couldn't start checkout. Please try again in a moment."),
        "stock" => Some("Some items are no longer available. Please review your cart."),
        _ => None,
    }
}

// =============================================================================
// Session + pricing helpers
// =============================================================================

async fn load_cart(session: &Session) -> Result<Cart> {
    Ok(crate::models::session::load(session, session_keys::CART).await?)
}

async fn save_cart(session: &Session, cart: &Cart) -> Result<()> {
    crate::models::session::save(session, session_keys::CART, cart).await?;
    Ok(())
}

/// Price the cart against fresh catalog data.
///
/// Products are fetched in one `include` request, variations per parent in
/// parallel. A failing variation fetch leaves that parent's lines unpriced.
async fn price_cart(state: &AppState, cart: &Cart) -> std::result::Result<(CartView, Vec<LineKey>), CommerceError> {
    let currency = state.currency();
    if cart.is_empty() {
        return Ok((CartView::empty(currency), Vec::new()));
    }

    let ids = cart.product_ids();
    let query = ProductQuery {
        include: ids.clone(),
        per_page: u32::try_from(ids.len()).unwrap_or(ProductQuery::MAX_PER_PAGE),
        ..ProductQuery::default()
    };
    let page = state.commerce().list_products(&query).await?;
    let products: HashMap<ProductId, ProductView> = map_products(&page.products, currency)
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut parents: Vec<ProductId> = cart
        .lines
        .iter()
        .filter(|l| l.variation_id.is_some())
        .map(|l| l.product_id)
        .collect();
    parents.sort_unstable();
    parents.dedup();

    let fetched = join_all(parents.into_iter().filter_map(|id| {
        let parent = products.get(&id)?;
        Some(async move {
            match state.commerce().list_variations(id).await {
                Ok(records) => records
                    .iter()
                    .map(|r| map_variation(r, &parent.name, currency))
                    .collect(),
                Err(e) => {
                    tracing::warn!(product_id = %id, error = %e, "Failed to fetch variations for cart");
                    Vec::new()
                }
            }
        })
    }))
    .await;

    let variations: HashMap<VariationId, VariationView> = fetched
        .into_iter()
        .flatten()
        .map(|v: VariationView| (v.id, v))
        .collect();

    Ok(CartView::build(cart, &products, &variations, currency))
}

/// Price the cart, dropping lines whose product or variation vanished.
///
/// An unreachable commerce API yields an empty view and leaves the
/// session untouched.
async fn priced_cart(state: &AppState, session: &Session) -> Result<CartView> {
    let mut cart = load_cart(session).await?;
    match price_cart(state, &cart).await {
        Ok((view, vanished)) => {
            if !vanished.is_empty() {
                tracing::info!(count = vanished.len(), "Dropping cart lines for vanished products");
                cart.lines.retain(|l| !vanished.contains(&l.key()));
                save_cart(session, &cart).await?;
            }
            Ok(view)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to price cart");
            Ok(CartView::empty(state.currency()))
        }
    }
}

/// Whether an item can be bought now and how many of it.
async fn purchase_limit(state: &AppState, key: LineKey) -> Result<(bool, u32)> {
    let commerce = state.commerce();
    let currency = state.currency();
    let product = map_product(&commerce.get_product(key.product_id).await?, currency);

    match key.variation_id {
        None => Ok((product.in_stock && !product.is_variable(), product.max_quantity)),
        Some(variation_id) => {
            let variation = commerce
                .list_variations(key.product_id)
                .await?
                .iter()
                .find(|v| v.id == variation_id)
                .map(|v| map_variation(v, &product.name, currency))
                .ok_or_else(|| AppError::NotFound(format!("variation {variation_id}")))?;
            Ok((variation.in_stock, variation.max_quantity))
        }
    }
}

/// Lines fragment for HTMX callers, a redirect to the cart page otherwise.
async fn lines_response(state: &AppState, session: &Session, headers: &HeaderMap) -> Result<Response> {
    if !is_fragment_request(headers) {
        return Ok(Redirect::to("/cart").into_response());
    }
    let cart = priced_cart(state, session).await?;
    Ok((AppendHeaders([CART_UPDATED_TRIGGER]), CartLinesTemplate { cart }).into_response())
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the cart page.
///
/// # Errors
///
/// Returns 500 if the session store fails.
#[instrument(skip(state, session, layout))]
pub async fn show(
    State(state): State<AppState>,
    Query(query): Query<CartPageQuery>,
    session: Session,
    layout: Layout,
) -> Result<impl IntoResponse> {
    let cart = priced_cart(&state, &session).await?;
    Ok(CartShowTemplate {
        layout,
        cart,
        error: error_message(query.error.as_deref()),
    })
}

/// Add an item to the cart.
///
/// # Errors
///
/// Returns 400 for a zero quantity, an out-of-stock item or a full cart,
/// 404 for an unknown product or variation.
#[instrument(skip(state, session, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let quantity = form.quantity.unwrap_or(1);
    if quantity == 0 {
        return Err(CartError::InvalidQuantity.into());
    }

    let key = LineKey::new(form.product_id, form.variation_id);
    let (in_stock, max) = purchase_limit(&state, key).await?;
    if !in_stock {
        return Err(CartError::OutOfStock.into());
    }

    let mut cart = load_cart(&session).await?;
    cart.add(key, quantity, max)?;
    save_cart(&session, &cart).await?;

    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", &form.product_id.to_string())]),
    );

    if is_fragment_request(&headers) {
        return Ok((
            AppendHeaders([CART_UPDATED_TRIGGER]),
            CartCountTemplate {
                count: cart.item_count(),
            },
        )
            .into_response());
    }
    Ok(Redirect::to("/cart").into_response())
}

/// Set a line's quantity. Zero removes the line.
///
/// # Errors
///
/// Returns 404 if the line is not in the cart.
#[instrument(skip(state, session, headers))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let key = LineKey::new(form.product_id, form.variation_id);
    let mut cart = load_cart(&session).await?;

    let max = if form.quantity == 0 {
        0
    } else {
        match purchase_limit(&state, key).await {
            Ok((_, max)) => max,
            Err(e) => {
                tracing::warn!(error = %e, "Using default quantity limit for cart update");
                crate::catalog::MAX_LINE_QUANTITY
            }
        }
    };
    cart.set_quantity(key, form.quantity, max)?;
    save_cart(&session, &cart).await?;

    lines_response(&state, &session, &headers).await
}

/// Remove a line.
///
/// # Errors
///
/// Returns 404 if the line is not in the cart.
#[instrument(skip(state, session, headers))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    let mut cart = load_cart(&session).await?;
    cart.remove(LineKey::new(form.product_id, form.variation_id))?;
    save_cart(&session, &cart).await?;

    lines_response(&state, &session, &headers).await
}

/// Cart count badge.
///
/// # Errors
///
/// Returns 500 if the session store fails.
#[instrument(skip(session))]
pub async fn count(session: Session) -> Result<impl IntoResponse> {
    Ok(CartCountTemplate {
        count: load_cart(&session).await?.item_count(),
    })
}

/// Create a pending order from the cart and redirect to its payment page.
///
/// The cart is cleared once the order exists. Any failure redirects back
/// to the cart with an error code.
#[instrument(skip(state, session))]
pub async fn checkout(State(state): State<AppState>, session: Session) -> Response {
    let cart = match load_cart(&session).await {
        Ok(cart) => cart,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load cart for checkout");
            return Redirect::to("/cart?error=checkout").into_response();
        }
    };
    if cart.is_empty() {
        return Redirect::to("/cart").into_response();
    }

    match price_cart(&state, &cart).await {
        Ok((view, vanished)) if vanished.is_empty() && view.can_checkout() => {}
        Ok(_) => return Redirect::to("/cart?error=stock").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to price cart for checkout");
            return Redirect::to("/cart?error=checkout").into_response();
        }
    }

    let mut draft = cart.to_order();
    if let Some(customer) = current_customer(&session).await {
        draft.billing = Some(OrderBilling {
            email: customer.email.to_string(),
        });
    }

    let order = match state.commerce().create_order(&draft).await {
        Ok(order) if !order.payment_url.is_empty() => order,
        Ok(order) => {
            tracing::error!(order_id = %order.id, "Created order has no payment URL");
            return Redirect::to("/cart?error=checkout").into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to create order");
            return Redirect::to("/cart?error=checkout").into_response();
        }
    };

    tracing::info!(order_id = %order.id, "Order created, redirecting to payment");
    if let Err(e) = save_cart(&session, &Cart::default()).await {
        tracing::error!(error = %e, "Failed to clear cart after checkout");
    }

    Redirect::to(&order.payment_url).into_response()
}
