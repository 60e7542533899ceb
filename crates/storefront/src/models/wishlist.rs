//! Session wishlist.

use apoteka_core::ProductId;
use serde::{Deserialize, Serialize};

/// Most products a wishlist keeps; adding beyond this evicts the oldest.
pub const MAX_ITEMS: usize = 100;

/// Ordered set of wishlisted products, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wishlist {
    #[serde(default)]
    ids: Vec<ProductId>,
}

impl Wishlist {
    /// Add a product. Returns `false` if it was already present.
    pub fn add(&mut self, id: ProductId) -> bool {
        if self.contains(id) {
            return false;
        }
        if self.ids.len() >= MAX_ITEMS {
            let overflow = self.ids.len() + 1 - MAX_ITEMS;
            self.ids.drain(..overflow);
        }
        self.ids.push(id);
        true
    }

    /// Remove a product. Returns `false` if it was not present.
    pub fn remove(&mut self, id: ProductId) -> bool {
        let before = self.ids.len();
        self.ids.retain(|existing| *existing != id);
        self.ids.len() != before
    }

    /// Add if absent, remove if present. Returns whether it is now wishlisted.
    pub fn toggle(&mut self, id: ProductId) -> bool {
        if self.remove(id) {
            false
        } else {
            self.add(id)
        }
    }

    #[must_use]
    pub fn contains(&self, id: ProductId) -> bool {
        self.ids.contains(&id)
    }

    /// Ids, oldest first.
    #[must_use]
    pub fn ids(&self) -> &[ProductId] {
        &self.ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
