//! Commerce backend checks.
//!
//! # Environment Variables
//!
//! - `COMMERCE_BASE_URL` - backend root URL
//! - `COMMERCE_CONSUMER_KEY` / `COMMERCE_CONSUMER_SECRET` - REST credentials

use apoteka_storefront::commerce::{CommerceClient, CommerceError, ProductQuery};
use apoteka_storefront::config::{CommerceConfig, ConfigError};

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Commerce error: {0}")]
    Commerce(#[from] CommerceError),
}

/// List categories and a single product to prove the credentials work.
///
/// # Errors
///
/// Returns an error if configuration is missing or either request fails.
pub async fn check() -> Result<(), CheckError> {
    let config = CommerceConfig::from_env()?;
    tracing::info!(url = %config.base_url, "Checking commerce backend...");

    let client = CommerceClient::new(&config);
    let query = ProductQuery {
        per_page: 1,
        ..ProductQuery::default()
    };
    let (categories, products) =
        tokio::join!(client.list_categories(), client.list_products(&query));
    let categories = categories?;
    let products = products?;

    tracing::info!(
        categories = categories.len(),
        products = products.total,
        "Commerce backend reachable"
    );
    Ok(())
}
