//! Data every full page needs for its header and footer.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::middleware::CspNonce;
use crate::models::{Cart, CurrentCustomer, Wishlist, session_keys};

/// Page chrome: CSP nonce, who is logged in and the header badges.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub nonce: String,
    pub customer_name: Option<String>,
    pub cart_count: u32,
    pub wishlist_count: usize,
}

impl Layout {
    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        self.customer_name.is_some()
    }
}

impl<S> FromRequestParts<S> for Layout
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CspNonce(nonce) = CspNonce::from_request_parts(parts, state).await?;
        let Some(session) = parts.extensions.get::<Session>().cloned() else {
            return Ok(Self {
                nonce,
                ..Self::default()
            });
        };

        // Read-only, so a store failure just renders empty counts.
        let cart: Cart = crate::models::session::load(&session, session_keys::CART)
            .await
            .unwrap_or_default();
        let wishlist: Wishlist = crate::models::session::load(&session, session_keys::WISHLIST)
            .await
            .unwrap_or_default();
        let customer = session
            .get::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
            .await
            .ok()
            .flatten();

        Ok(Self {
            nonce,
            customer_name: customer.map(|c| c.display_name),
            cart_count: cart.item_count(),
            wishlist_count: wishlist.len(),
        })
    }
}
