//! Cache types for commerce API responses.

use super::types::{
    AttributeRecord, AttributeTermRecord, CategoryRecord, ProductPage, ProductRecord, TagRecord,
    VariationRecord,
};

/// Cached value types.
///
/// Keys are the request path plus its query string, so two requests share
/// an entry only when they would hit the same upstream URL.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<ProductRecord>),
    Products(ProductPage),
    Variations(Vec<VariationRecord>),
    Categories(Vec<CategoryRecord>),
    Tags(Vec<TagRecord>),
    Attributes(Vec<AttributeRecord>),
    AttributeTerms(Vec<AttributeTermRecord>),
}

/// Build a cache key from a path and its query parameters.
pub fn cache_key(path: &str, params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return path.to_string();
    }
    let query = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{path}?{query}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_includes_params_in_order() {
        let key = cache_key(
            "/products",
            &[("page", "2".to_string()), ("category", "7".to_string())],
        );
        assert_eq!(key, "/products?page=2&category=7");
        assert_eq!(cache_key("/products/categories", &[]), "/products/categories");
    }
}
