//! Commerce API client.
//!
//! # Architecture
//!
//! - REST over `reqwest` against a WooCommerce-v3-shaped API
//!   (`{base}/wp-json/wc/v3/...`) with consumer key/secret basic auth
//! - The commerce backend is the source of truth - no local catalog copy
//! - Catalog reads are cached in memory via `moka` and revalidated after a
//!   configurable TTL; searches, orders and token calls are never cached
//!
//! # Example
//!
//! ```rust,ignore
//! use apoteka_storefront::commerce::{CommerceClient, ProductQuery};
//!
//! let client = CommerceClient::new(&config.commerce);
//!
//! let page = client.list_products(&ProductQuery::default()).await?;
//! let product = client.get_product_by_slug("ibuprofen-400").await?;
//! let variations = client.list_variations(product.id).await?;
//! ```

mod cache;
mod client;
pub mod types;

pub use client::CommerceClient;
pub use types::*;

use thiserror::Error;

/// Errors that can occur when talking to the commerce API.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the commerce backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl CommerceError {
    /// Whether the error means the requested record does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commerce_error_display() {
        let err = CommerceError::NotFound("product ibuprofen".to_string());
        assert_eq!(err.to_string(), "Not found: product ibuprofen");
        assert!(err.is_not_found());

        let err = CommerceError::Api {
            status: 401,
            message: "invalid consumer key".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 401 - invalid consumer key");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_rate_limited_error() {
        let err = CommerceError::RateLimited(30);
        assert_eq!(err.to_string(), "Rate limited, retry after 30 seconds");
    }
}
