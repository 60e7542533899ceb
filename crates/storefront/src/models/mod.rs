//! Per-visitor state kept in the session.
//!
//! The cart, wishlist and reminder book live server-side in the visitor's
//! session rather than in browser storage. Each is a plain serde type with
//! its own invariants; route handlers load it, mutate it and write it back.

pub mod cart;
pub mod session;
pub mod wishlist;

pub use cart::{Cart, CartError, CartLine, CartLineView, CartView, LineKey};
pub use session::{CurrentCustomer, keys as session_keys};
pub use wishlist::Wishlist;
