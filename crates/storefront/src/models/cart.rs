//! Session cart.
//!
//! The cart only stores what the visitor chose: product, optional variation
//! and quantity. Names, prices and stock always come from fresh catalog data
//! when the cart is rendered, so a stale session can never show a stale
//! price.

use std::collections::HashMap;

use apoteka_core::{ColdChainClass, CurrencyCode, Price, ProductId, VariationId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{ImageView, ProductView, VariationView};
use crate::commerce::types::{OrderDraft, OrderLineDraft};

/// Most distinct lines a cart may hold.
pub const MAX_LINES: usize = 50;

/// Errors from cart mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CartError {
    /// Quantity of zero where at least one is required.
    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    /// The item cannot be purchased right now.
    #[error("This item is out of stock")]
    OutOfStock,

    /// The cart already holds the maximum number of lines.
    #[error("Your cart is full")]
    TooManyLines,

    /// No line with this key.
    #[error("Item is not in your cart")]
    LineNotFound,
}

/// Identity of a cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineKey {
    pub product_id: ProductId,
    pub variation_id: Option<VariationId>,
}

impl LineKey {
    #[must_use]
    pub const fn new(product_id: ProductId, variation_id: Option<VariationId>) -> Self {
        Self {
            product_id,
            variation_id,
        }
    }
}

/// A cart line as stored in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    #[serde(default)]
    pub variation_id: Option<VariationId>,
    pub quantity: u32,
}

impl CartLine {
    #[must_use]
    pub const fn key(&self) -> LineKey {
        LineKey::new(self.product_id, self.variation_id)
    }
}

/// The visitor's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default)]
    pub lines: Vec<CartLine>,
}

impl Cart {
    /// Add `quantity` of an item, merging with an existing line.
    ///
    /// The resulting line quantity is clamped to `1..=max`. Returns the new
    /// line quantity.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for a zero quantity and
    /// `CartError::TooManyLines` when a new line would exceed [`MAX_LINES`].
    pub fn add(&mut self, key: LineKey, quantity: u32, max: u32) -> Result<u32, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        let max = max.max(1);

        if let Some(line) = self.lines.iter_mut().find(|l| l.key() == key) {
            line.quantity = line.quantity.saturating_add(quantity).clamp(1, max);
            return Ok(line.quantity);
        }

        if self.lines.len() >= MAX_LINES {
            return Err(CartError::TooManyLines);
        }

        let quantity = quantity.clamp(1, max);
        self.lines.push(CartLine {
            product_id: key.product_id,
            variation_id: key.variation_id,
            quantity,
        });
        Ok(quantity)
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// Returns the stored quantity (0 when removed).
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the line does not exist.
    pub fn set_quantity(&mut self, key: LineKey, quantity: u32, max: u32) -> Result<u32, CartError> {
        if quantity == 0 {
            return self.remove(key).map(|()| 0);
        }
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.key() == key)
            .ok_or(CartError::LineNotFound)?;
        line.quantity = quantity.clamp(1, max.max(1));
        Ok(line.quantity)
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the line does not exist.
    pub fn remove(&mut self, key: LineKey) -> Result<(), CartError> {
        let before = self.lines.len();
        self.lines.retain(|l| l.key() != key);
        if self.lines.len() == before {
            return Err(CartError::LineNotFound);
        }
        Ok(())
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Total number of units.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0u32, |acc, l| acc.saturating_add(l.quantity))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Distinct product ids in line order.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            if !ids.contains(&line.product_id) {
                ids.push(line.product_id);
            }
        }
        ids
    }

    /// Pending order for the current lines.
    #[must_use]
    pub fn to_order(&self) -> OrderDraft {
        OrderDraft::pending(
            self.lines
                .iter()
                .map(|l| OrderLineDraft {
                    product_id: l.product_id,
                    variation_id: l.variation_id,
                    quantity: l.quantity,
                })
                .collect(),
        )
    }
}

// =============================================================================
// Priced view
// =============================================================================

/// A cart line priced against current catalog data.
#[derive(Debug, Clone)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub variation_id: Option<VariationId>,
    pub slug: String,
    pub name: String,
    pub variation_label: Option<String>,
    pub quantity: u32,
    pub max_quantity: u32,
    pub unit_price: Price,
    pub line_total: Price,
    pub image: Option<ImageView>,
    pub cold_chain: ColdChainClass,
    pub requires_prescription: bool,
    pub in_stock: bool,
}

/// The whole cart priced for display.
#[derive(Debug, Clone)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub subtotal: Price,
    pub item_count: u32,
    /// At least one line must ship cold.
    pub has_cold_chain: bool,
    pub has_prescription: bool,
}

impl CartView {
    /// An empty cart in the store currency.
    #[must_use]
    pub const fn empty(currency: CurrencyCode) -> Self {
        Self {
            lines: Vec::new(),
            subtotal: Price::zero(currency),
            item_count: 0,
            has_cold_chain: false,
            has_prescription: false,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether every line can be ordered as-is.
    #[must_use]
    pub fn can_checkout(&self) -> bool {
        !self.lines.is_empty() && self.lines.iter().all(|l| l.in_stock)
    }

    /// Price a cart against fetched products and variations.
    ///
    /// Returns the view and the keys of lines that could not be priced
    /// because the product (or variation) no longer exists or has no price.
    #[must_use]
    pub fn build(
        cart: &Cart,
        products: &HashMap<ProductId, ProductView>,
        variations: &HashMap<VariationId, VariationView>,
        currency: CurrencyCode,
    ) -> (Self, Vec<LineKey>) {
        let mut view = Self::empty(currency);
        let mut vanished = Vec::new();

        for line in &cart.lines {
            let Some(product) = products.get(&line.product_id) else {
                vanished.push(line.key());
                continue;
            };

            let variation = match line.variation_id {
                Some(id) => match variations.get(&id) {
                    Some(v) => Some(v),
                    None => {
                        vanished.push(line.key());
                        continue;
                    }
                },
                None => None,
            };

            let (unit_price, in_stock, max_quantity, image) = match variation {
                Some(v) => (
                    v.display_price,
                    v.in_stock,
                    v.max_quantity,
                    v.image.clone().or_else(|| product.primary_image().cloned()),
                ),
                None => (
                    product.display_price,
                    product.in_stock,
                    product.max_quantity,
                    product.primary_image().cloned(),
                ),
            };

            let Some(unit_price) = unit_price else {
                vanished.push(line.key());
                continue;
            };

            let line_total = unit_price.times(line.quantity);
            if let Some(sum) = view.subtotal.checked_add(&line_total) {
                view.subtotal = sum;
            }
            view.item_count = view.item_count.saturating_add(line.quantity);
            view.has_cold_chain |= product.cold_chain.requires_cold_shipping();
            view.has_prescription |= product.requires_prescription;

            view.lines.push(CartLineView {
                product_id: product.id,
                variation_id: line.variation_id,
                slug: product.slug.clone(),
                name: product.name.clone(),
                variation_label: variation.map(VariationView::label).filter(|l| !l.is_empty()),
                quantity: line.quantity,
                max_quantity,
                unit_price,
                line_total,
                image,
                cold_chain: product.cold_chain,
                requires_prescription: product.requires_prescription,
                in_stock,
            });
        }

        (view, vanished)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::{map_product, map_variation};
    use crate::commerce::types::{ProductRecord, VariationRecord};
    use serde_json::json;

    fn key(product: u64) -> LineKey {
        LineKey::new(ProductId::new(product), None)
    }

    fn product(value: serde_json::Value) -> ProductView {
        let record: ProductRecord = serde_json::from_value(value).unwrap();
        map_product(&record, CurrencyCode::EUR)
    }

    #[test]
    fn test_add_merges_and_clamps() {
        let mut cart = Cart::default();
        assert_eq!(cart.add(key(1), 2, 10).unwrap(), 2);
        assert_eq!(cart.add(key(1), 9, 10).unwrap(), 10);
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.item_count(), 10);
    }

    #[test]
    fn test_add_rejects_zero() {
        let mut cart = Cart::default();
        assert_eq!(cart.add(key(1), 0, 10), Err(CartError::InvalidQuantity));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_variations_are_separate_lines() {
        let mut cart = Cart::default();
        let a = LineKey::new(ProductId::new(1), Some(VariationId::new(10)));
        let b = LineKey::new(ProductId::new(1), Some(VariationId::new(11)));
        cart.add(a, 1, 10).unwrap();
        cart.add(b, 1, 10).unwrap();
        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.product_ids(), vec![ProductId::new(1)]);
    }

    #[test]
    fn test_line_limit() {
        let mut cart = Cart::default();
        for id in 0..MAX_LINES as u64 {
            cart.add(key(id), 1, 10).unwrap();
        }
        assert_eq!(cart.add(key(999), 1, 10), Err(CartError::TooManyLines));
        assert_eq!(cart.add(key(0), 1, 10), Ok(2));
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut cart = Cart::default();
        cart.add(key(1), 3, 10).unwrap();
        assert_eq!(cart.set_quantity(key(1), 5, 4).unwrap(), 4);
        assert_eq!(cart.set_quantity(key(1), 0, 4).unwrap(), 0);
        assert!(cart.is_empty());
        assert_eq!(cart.set_quantity(key(1), 1, 4), Err(CartError::LineNotFound));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = Cart::default();
        cart.add(key(1), 1, 10).unwrap();
        cart.add(key(2), 1, 10).unwrap();
        cart.remove(key(1)).unwrap();
        assert_eq!(cart.remove(key(1)), Err(CartError::LineNotFound));
        cart.clear();
        assert_eq!(cart.item_count(), 0);
    }

    #[test]
    fn test_to_order() {
        let mut cart = Cart::default();
        cart.add(LineKey::new(ProductId::new(1), Some(VariationId::new(7))), 2, 10)
            .unwrap();
        let order = cart.to_order();
        assert_eq!(order.status, "pending");
        assert!(!order.set_paid);
        let body = serde_json::to_value(&order).unwrap();
        assert_eq!(body["line_items"][0]["variation_id"], 7);
        assert_eq!(body["line_items"][0]["quantity"], 2);
    }

    #[test]
    fn test_build_prices_lines_and_drops_vanished() {
        let mut cart = Cart::default();
        cart.add(key(1), 2, 10).unwrap();
        cart.add(key(2), 1, 10).unwrap();
        cart.add(key(3), 1, 10).unwrap();

        let insulin = product(json!({
            "id": 1, "slug": "insulin-pen", "name": "Insulin pen", "purchasable": true,
            "price": "24.50", "stock_status": "instock",
            "categories": [{ "id": 4, "slug": "insulin" }]
        }));
        let unpriced = product(json!({ "id": 2, "name": "No price", "price": "" }));
        let products = HashMap::from([(insulin.id, insulin), (unpriced.id, unpriced)]);

        let (view, vanished) = CartView::build(&cart, &products, &HashMap::new(), CurrencyCode::EUR);

        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.subtotal.display(), "€49.00");
        assert_eq!(view.item_count, 2);
        assert!(view.has_cold_chain);
        assert!(view.can_checkout());
        assert_eq!(vanished, vec![key(2), key(3)]);
    }

    #[test]
    fn test_build_uses_variation_price() {
        let mut cart = Cart::default();
        let line = LineKey::new(ProductId::new(1), Some(VariationId::new(10)));
        cart.add(line, 3, 10).unwrap();

        let parent = product(json!({ "id": 1, "name": "Vitamin C", "price": "5.00" }));
        let record: VariationRecord = serde_json::from_value(json!({
            "id": 10, "price": "4.00", "purchasable": true, "stock_status": "instock",
            "attributes": [{ "name": "Pack size", "option": "100" }]
        }))
        .unwrap();
        let variation = map_variation(&record, "Vitamin C", CurrencyCode::EUR);

        let (view, vanished) = CartView::build(
            &cart,
            &HashMap::from([(parent.id, parent)]),
            &HashMap::from([(variation.id, variation)]),
            CurrencyCode::EUR,
        );

        assert!(vanished.is_empty());
        assert_eq!(view.subtotal.display(), "€12.00");
        assert_eq!(view.lines[0].variation_label.as_deref(), Some("Pack size: 100"));
        assert!(!view.has_cold_chain);
    }
}
