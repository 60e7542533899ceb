//! Raw catalog records as returned by the commerce REST API.
//!
//! These mirror the upstream JSON closely and deserialize leniently: missing
//! fields fall back to defaults, `null` strings become empty strings, and
//! flags that the API sometimes reports as strings are coerced to `bool`.
//! Mapping into UI-ready view models happens in [`crate::catalog`].

use apoteka_core::{AttributeId, CategoryId, MediaId, OrderId, ProductId, StockStatus, TagId, VariationId};
use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Lenient field helpers
// =============================================================================

/// Deserialize a string that may be `null`.
fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Deserialize a flag that may arrive as a bool, a string, or a number.
///
/// Variations report `manage_stock` as `"parent"` when stock is tracked on
/// the parent product; that still means a quantity is being managed.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_is_truthy(&value))
}

/// Truthiness of a loosely-typed JSON value (`true`, `"yes"`, `"1"`, `1`, ...).
#[must_use]
pub fn value_is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        serde_json::Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "parent"
        ),
        _ => false,
    }
}

// =============================================================================
// Shared shapes
// =============================================================================

/// Reference to a category or tag embedded in a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TermRef {
    pub id: u64,
    #[serde(deserialize_with = "nullable_string")]
    pub name: String,
    #[serde(deserialize_with = "nullable_string")]
    pub slug: String,
}

/// Product, variation, or category image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageRecord {
    pub id: MediaId,
    #[serde(deserialize_with = "nullable_string")]
    pub src: String,
    #[serde(deserialize_with = "nullable_string")]
    pub name: String,
    #[serde(deserialize_with = "nullable_string")]
    pub alt: String,
}

/// Free-form metadata entry attached by plugins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaData {
    #[serde(deserialize_with = "nullable_string")]
    pub key: String,
    pub value: serde_json::Value,
}

/// Attribute as attached to a product (id 0 for custom attributes).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductAttributeRecord {
    pub id: AttributeId,
    #[serde(deserialize_with = "nullable_string")]
    pub name: String,
    pub position: u32,
    #[serde(deserialize_with = "lenient_bool")]
    pub visible: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub variation: bool,
    pub options: Vec<String>,
}

// =============================================================================
// Catalog records
// =============================================================================

/// A product record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductRecord {
    pub id: ProductId,
    #[serde(deserialize_with = "nullable_string")]
    pub name: String,
    #[serde(deserialize_with = "nullable_string")]
    pub slug: String,
    #[serde(deserialize_with = "nullable_string")]
    pub permalink: String,
    /// `simple`, `variable`, `grouped` or `external`.
    #[serde(rename = "type", deserialize_with = "nullable_string")]
    pub kind: String,
    #[serde(deserialize_with = "nullable_string")]
    pub status: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub featured: bool,
    #[serde(deserialize_with = "nullable_string")]
    pub description: String,
    #[serde(deserialize_with = "nullable_string")]
    pub short_description: String,
    #[serde(deserialize_with = "nullable_string")]
    pub sku: String,
    /// Current effective price.
    #[serde(deserialize_with = "nullable_string")]
    pub price: String,
    #[serde(deserialize_with = "nullable_string")]
    pub regular_price: String,
    /// Empty when the product is not on sale.
    #[serde(deserialize_with = "nullable_string")]
    pub sale_price: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub on_sale: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub purchasable: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub manage_stock: bool,
    pub stock_quantity: Option<i64>,
    pub stock_status: StockStatus,
    pub categories: Vec<TermRef>,
    pub tags: Vec<TermRef>,
    pub images: Vec<ImageRecord>,
    pub attributes: Vec<ProductAttributeRecord>,
    pub variations: Vec<VariationId>,
    pub cross_sell_ids: Vec<ProductId>,
    pub related_ids: Vec<ProductId>,
    pub meta_data: Vec<MetaData>,
    #[serde(deserialize_with = "nullable_string")]
    pub average_rating: String,
    pub rating_count: u32,
}

/// Attribute selection on a variation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VariationAttributeRecord {
    pub id: AttributeId,
    #[serde(deserialize_with = "nullable_string")]
    pub name: String,
    #[serde(deserialize_with = "nullable_string")]
    pub option: String,
}

/// A product variation record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VariationRecord {
    pub id: VariationId,
    #[serde(deserialize_with = "nullable_string")]
    pub sku: String,
    #[serde(deserialize_with = "nullable_string")]
    pub price: String,
    #[serde(deserialize_with = "nullable_string")]
    pub regular_price: String,
    #[serde(deserialize_with = "nullable_string")]
    pub sale_price: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub purchasable: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub manage_stock: bool,
    pub stock_quantity: Option<i64>,
    pub stock_status: StockStatus,
    pub image: Option<ImageRecord>,
    pub attributes: Vec<VariationAttributeRecord>,
    pub meta_data: Vec<MetaData>,
}

/// A product category record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryRecord {
    pub id: CategoryId,
    #[serde(deserialize_with = "nullable_string")]
    pub name: String,
    #[serde(deserialize_with = "nullable_string")]
    pub slug: String,
    /// Parent category id, 0 for top-level categories.
    pub parent: u64,
    #[serde(deserialize_with = "nullable_string")]
    pub description: String,
    pub image: Option<ImageRecord>,
    pub menu_order: i64,
    pub count: u32,
}

/// A product tag record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TagRecord {
    pub id: TagId,
    #[serde(deserialize_with = "nullable_string")]
    pub name: String,
    #[serde(deserialize_with = "nullable_string")]
    pub slug: String,
    #[serde(deserialize_with = "nullable_string")]
    pub description: String,
    pub count: u32,
}

/// A global product attribute record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeRecord {
    pub id: AttributeId,
    #[serde(deserialize_with = "nullable_string")]
    pub name: String,
    #[serde(deserialize_with = "nullable_string")]
    pub slug: String,
    #[serde(rename = "type", deserialize_with = "nullable_string")]
    pub kind: String,
    #[serde(deserialize_with = "nullable_string")]
    pub order_by: String,
}

/// A term of a global attribute (e.g., "100 ml" of "Pack size").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeTermRecord {
    pub id: u64,
    #[serde(deserialize_with = "nullable_string")]
    pub name: String,
    #[serde(deserialize_with = "nullable_string")]
    pub slug: String,
    pub count: u32,
}

// =============================================================================
// Listing & query types
// =============================================================================

/// One page of products plus upstream pagination totals.
#[derive(Debug, Clone, Default)]
pub struct ProductPage {
    pub products: Vec<ProductRecord>,
    /// Total matching products (`X-WP-Total`).
    pub total: u64,
    /// Total pages at the requested page size (`X-WP-TotalPages`).
    pub total_pages: u32,
    /// The page that was requested (1-based).
    pub page: u32,
}

impl ProductPage {
    /// Whether a further page exists.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Product sort orders offered on listing pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductSort {
    #[default]
    Latest,
    PriceAsc,
    PriceDesc,
    Popularity,
    Rating,
    Title,
}

impl ProductSort {
    /// Upstream `orderby` / `order` pair.
    #[must_use]
    pub const fn params(&self) -> (&'static str, &'static str) {
        match self {
            Self::Latest => ("date", "desc"),
            Self::PriceAsc => ("price", "asc"),
            Self::PriceDesc => ("price", "desc"),
            Self::Popularity => ("popularity", "desc"),
            Self::Rating => ("rating", "desc"),
            Self::Title => ("title", "asc"),
        }
    }

    /// Query-string value (inverse of deserialization).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::PriceAsc => "price-asc",
            Self::PriceDesc => "price-desc",
            Self::Popularity => "popularity",
            Self::Rating => "rating",
            Self::Title => "title",
        }
    }

    /// Parse a query-string value; unknown values yield `None`.
    #[must_use]
    pub fn from_param(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|sort| sort.as_str() == value.trim())
    }

    /// Every sort, in the order offered on listing pages.
    pub const ALL: [Self; 6] = [
        Self::Latest,
        Self::PriceAsc,
        Self::PriceDesc,
        Self::Popularity,
        Self::Rating,
        Self::Title,
    ];

    /// Label for the sort dropdown.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Latest => "Newest",
            Self::PriceAsc => "Price: low to high",
            Self::PriceDesc => "Price: high to low",
            Self::Popularity => "Most popular",
            Self::Rating => "Top rated",
            Self::Title => "Name",
        }
    }
}

/// Filters for product listings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductQuery {
    pub page: u32,
    pub per_page: u32,
    pub category: Option<CategoryId>,
    pub tag: Option<TagId>,
    pub search: Option<String>,
    pub featured: bool,
    pub on_sale: bool,
    pub include: Vec<ProductId>,
    pub sort: ProductSort,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: Self::DEFAULT_PER_PAGE,
            category: None,
            tag: None,
            search: None,
            featured: false,
            on_sale: false,
            include: Vec::new(),
            sort: ProductSort::default(),
        }
    }
}

impl ProductQuery {
    /// Default page size for listing pages.
    pub const DEFAULT_PER_PAGE: u32 = 12;
    /// Upper bound enforced by the commerce API.
    pub const MAX_PER_PAGE: u32 = 100;

    /// Upstream query parameters. Only published products are requested.
    #[must_use]
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let (orderby, order) = self.sort.params();
        let mut params = vec![
            ("status", "publish".to_string()),
            ("page", self.page.max(1).to_string()),
            (
                "per_page",
                self.per_page.clamp(1, Self::MAX_PER_PAGE).to_string(),
            ),
            ("orderby", orderby.to_string()),
            ("order", order.to_string()),
        ];
        if let Some(category) = self.category {
            params.push(("category", category.to_string()));
        }
        if let Some(tag) = self.tag {
            params.push(("tag", tag.to_string()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            params.push(("search", search.to_string()));
        }
        if self.featured {
            params.push(("featured", "true".to_string()));
        }
        if self.on_sale {
            params.push(("on_sale", "true".to_string()));
        }
        if !self.include.is_empty() {
            let ids = self
                .include
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            params.push(("include", ids));
        }
        params
    }

    /// Whether this query is a free-text search (never cached).
    #[must_use]
    pub fn is_search(&self) -> bool {
        self.search.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

// =============================================================================
// Orders
// =============================================================================

/// A line of a new order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderLineDraft {
    pub product_id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variation_id: Option<VariationId>,
    pub quantity: u32,
}

/// Billing contact for a new order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderBilling {
    pub email: String,
}

/// Request body for creating a pending order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDraft {
    pub status: &'static str,
    pub set_paid: bool,
    pub line_items: Vec<OrderLineDraft>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing: Option<OrderBilling>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_note: Option<String>,
}

impl OrderDraft {
    /// A pending, unpaid order for the given lines.
    #[must_use]
    pub const fn pending(line_items: Vec<OrderLineDraft>) -> Self {
        Self {
            status: "pending",
            set_paid: false,
            line_items,
            billing: None,
            customer_note: None,
        }
    }
}

/// The fields of a created order the storefront needs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrderCreated {
    pub id: OrderId,
    #[serde(deserialize_with = "nullable_string")]
    pub order_key: String,
    #[serde(deserialize_with = "nullable_string")]
    pub payment_url: String,
    #[serde(deserialize_with = "nullable_string")]
    pub status: String,
    #[serde(deserialize_with = "nullable_string")]
    pub total: String,
}

// =============================================================================
// Token proxy
// =============================================================================

/// Credentials forwarded to the commerce token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

/// The `wp/v2/users/me` profile behind a token (`context=edit`).
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

/// An upstream response relayed verbatim to the caller.
#[derive(Debug, Clone)]
pub struct ProxiedResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ProxiedResponse {
    /// Whether the upstream answered with a 2xx status.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_product_record_tolerates_nulls_and_missing_fields() {
        let record: ProductRecord = serde_json::from_value(json!({
            "id": 10,
            "name": "Ibuprofen 400",
            "sale_price": null,
            "stock_quantity": null,
            "stock_status": "instock"
        }))
        .unwrap();

        assert_eq!(record.id, ProductId::new(10));
        assert_eq!(record.sale_price, "");
        assert!(record.stock_quantity.is_none());
        assert_eq!(record.stock_status, StockStatus::InStock);
        assert!(record.categories.is_empty());
    }

    #[test]
    fn test_product_sort_from_param() {
        assert_eq!(ProductSort::from_param("price-asc"), Some(ProductSort::PriceAsc));
        assert_eq!(ProductSort::from_param(" title "), Some(ProductSort::Title));
        assert_eq!(ProductSort::from_param("cheapest"), None);
        for sort in ProductSort::ALL {
            assert_eq!(ProductSort::from_param(sort.as_str()), Some(sort));
        }
    }

    #[test]
    fn test_variation_manage_stock_parent_is_truthy() {
        let record: VariationRecord = serde_json::from_value(json!({
            "id": 3,
            "manage_stock": "parent",
            "stock_quantity": 4
        }))
        .unwrap();
        assert!(record.manage_stock);
        assert_eq!(record.stock_quantity, Some(4));
    }

    #[test]
    fn test_value_is_truthy() {
        assert!(value_is_truthy(&json!(true)));
        assert!(value_is_truthy(&json!("yes")));
        assert!(value_is_truthy(&json!(1)));
        assert!(!value_is_truthy(&json!("no")));
        assert!(!value_is_truthy(&json!(0)));
        assert!(!value_is_truthy(&json!(null)));
    }

    #[test]
    fn test_product_query_params() {
        let query = ProductQuery {
            page: 0,
            per_page: 500,
            category: Some(CategoryId::new(7)),
            search: Some("  ".to_string()),
            on_sale: true,
            include: vec![ProductId::new(1), ProductId::new(2)],
            sort: ProductSort::PriceAsc,
            ..ProductQuery::default()
        };
        let params = query.to_params();
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("page"), Some("1"));
        assert_eq!(get("per_page"), Some("100"));
        assert_eq!(get("category"), Some("7"));
        assert_eq!(get("orderby"), Some("price"));
        assert_eq!(get("order"), Some("asc"));
        assert_eq!(get("on_sale"), Some("true"));
        assert_eq!(get("include"), Some("1,2"));
        assert_eq!(get("search"), None);
        assert!(!query.is_search());
    }

    #[test]
    fn test_order_draft_serialization_skips_empty_fields() {
        let draft = OrderDraft::pending(vec![OrderLineDraft {
            product_id: ProductId::new(5),
            variation_id: None,
            quantity: 2,
        }]);
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["status"], "pending");
        assert_eq!(value["set_paid"], false);
        assert_eq!(value["line_items"][0]["quantity"], 2);
        assert!(value["line_items"][0].get("variation_id").is_none());
        assert!(value.get("billing").is_none());
    }
}
