//! Catalog view models.
//!
//! Pure mapping from raw commerce records ([`crate::commerce::types`]) into
//! the UI-ready structs the templates render. All derived flags (sale state,
//! stock eligibility, cold-chain class, prescription requirement) are
//! computed here at read time and never stored.

pub mod cross_sell;

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use apoteka_core::{
    AttributeId, CategoryId, ColdChainClass, CurrencyCode, Price, ProductId, StockStatus, TagId,
    VariationId,
};
use regex::Regex;

use crate::commerce::types::{
    AttributeRecord, AttributeTermRecord, CategoryRecord, ImageRecord, MetaData,
    ProductAttributeRecord, ProductRecord, TagRecord, TermRef, VariationRecord, value_is_truthy,
};

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: u32 = 10;

/// Managed stock at or below this count is flagged as running low.
pub const LOW_STOCK_THRESHOLD: i64 = 5;

/// Category/tag slugs that mark a refrigerated product.
const REFRIGERATED_SLUGS: &[&str] = &["cold-chain", "refrigerated", "kuehlware", "insulin", "vaccines"];

/// Category/tag slugs that mark a frozen product.
const FROZEN_SLUGS: &[&str] = &["frozen"];

/// Category/tag slugs that mark a prescription-only product.
const PRESCRIPTION_SLUGS: &[&str] = &["rx", "prescription"];

/// Storage attribute phrases that mean refrigerated.
const REFRIGERATED_PHRASES: &[&str] = &["2-8", "2–8", "refrigerat", "fridge"];

/// Storage attribute phrases that mean frozen.
const FROZEN_PHRASES: &[&str] = &["frozen", "-20"];

const COLD_CHAIN_META: &str = "_cold_chain";
const PRESCRIPTION_META: &str = "_prescription_required";

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid regex"));

// =============================================================================
// View models
// =============================================================================

/// Product image ready for an `<img>` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageView {
    pub src: String,
    pub alt: String,
}

/// Category or tag reference shown on a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermView {
    pub id: u64,
    pub slug: String,
    pub name: String,
}

/// A visible product attribute ("Active ingredient: Ibuprofen").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductAttributeView {
    pub name: String,
    pub values: Vec<String>,
}

impl ProductAttributeView {
    /// Values joined for display.
    #[must_use]
    pub fn joined(&self) -> String {
        self.values.join(", ")
    }
}

/// Product kind as far as the storefront cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductKind {
    Simple,
    Variable,
    Other,
}

/// A product mapped for display.
#[derive(Debug, Clone)]
pub struct ProductView {
    pub id: ProductId,
    pub slug: String,
    pub name: String,
    pub kind: ProductKind,
    /// Short description with markup stripped.
    pub short_description: String,
    /// Full description HTML as authored in the commerce backend.
    pub description_html: String,
    pub sku: String,
    pub price: Option<Price>,
    pub regular_price: Option<Price>,
    pub sale_price: Option<Price>,
    /// The price the customer pays.
    pub display_price: Option<Price>,
    /// Struck-through price, set only while on sale.
    pub compare_at_price: Option<Price>,
    pub is_on_sale: bool,
    pub discount_percentage: Option<u32>,
    pub stock_status: StockStatus,
    pub stock_quantity: Option<i64>,
    /// Eligible for purchase right now.
    pub in_stock: bool,
    pub low_stock: bool,
    pub cold_chain: ColdChainClass,
    pub requires_prescription: bool,
    pub images: Vec<ImageView>,
    pub categories: Vec<TermView>,
    pub tags: Vec<TermView>,
    pub attributes: Vec<ProductAttributeView>,
    pub variation_ids: Vec<VariationId>,
    pub cross_sell_ids: Vec<ProductId>,
    pub rating: Option<f32>,
    pub review_count: u32,
    pub max_quantity: u32,
}

impl ProductView {
    /// First image, if any.
    #[must_use]
    pub fn primary_image(&self) -> Option<&ImageView> {
        self.images.first()
    }

    /// Whether the product has variations to choose from.
    #[must_use]
    pub fn is_variable(&self) -> bool {
        self.kind == ProductKind::Variable && !self.variation_ids.is_empty()
    }

    /// Whether the product belongs to the category with this slug.
    #[must_use]
    pub fn in_category(&self, slug: &str) -> bool {
        self.categories.iter().any(|c| c.slug == slug)
    }

    /// Whether the product carries the tag with this slug.
    #[must_use]
    pub fn has_tag(&self, slug: &str) -> bool {
        self.tags.iter().any(|t| t.slug == slug)
    }
}

/// A variation mapped for display.
#[derive(Debug, Clone)]
pub struct VariationView {
    pub id: VariationId,
    pub sku: String,
    /// "Name: Option" pairs.
    pub attributes: Vec<String>,
    pub price: Option<Price>,
    pub regular_price: Option<Price>,
    pub sale_price: Option<Price>,
    pub display_price: Option<Price>,
    pub compare_at_price: Option<Price>,
    pub is_on_sale: bool,
    pub discount_percentage: Option<u32>,
    pub stock_status: StockStatus,
    pub stock_quantity: Option<i64>,
    pub in_stock: bool,
    pub low_stock: bool,
    pub max_quantity: u32,
    pub image: Option<ImageView>,
}

impl VariationView {
    /// Attribute pairs joined into one label ("Strength: 400 mg, Pack: 20").
    #[must_use]
    pub fn label(&self) -> String {
        self.attributes.join(", ")
    }
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryView {
    pub id: CategoryId,
    pub slug: String,
    pub name: String,
    pub parent: Option<CategoryId>,
    pub description: String,
    pub image: Option<ImageView>,
    pub count: u32,
}

/// A product tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagView {
    pub id: TagId,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub count: u32,
}

/// A term of a global attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeTermView {
    pub slug: String,
    pub name: String,
    pub count: u32,
}

/// A global attribute with its terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeView {
    pub id: AttributeId,
    pub slug: String,
    pub name: String,
    pub terms: Vec<AttributeTermView>,
}

/// A category with its nested subcategories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryNode {
    pub category: CategoryView,
    pub children: Vec<CategoryNode>,
}

// =============================================================================
// Derivations
// =============================================================================

/// Price fields derived from the three raw price strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pricing {
    price: Option<Price>,
    regular_price: Option<Price>,
    sale_price: Option<Price>,
    display_price: Option<Price>,
    compare_at_price: Option<Price>,
    is_on_sale: bool,
    discount_percentage: Option<u32>,
}

fn derive_pricing(price: &str, regular: &str, sale: &str, currency: CurrencyCode) -> Pricing {
    let price = Price::parse(price, currency);
    let regular_price = Price::parse(regular, currency).or(price);
    let sale_price = Price::parse(sale, currency);

    let on_sale_pair = match (regular_price, sale_price) {
        (Some(regular), Some(sale)) if sale.amount < regular.amount => Some((regular, sale)),
        _ => None,
    };

    match on_sale_pair {
        Some((regular, sale)) => Pricing {
            price,
            regular_price,
            sale_price,
            display_price: Some(sale),
            compare_at_price: Some(regular),
            is_on_sale: true,
            discount_percentage: Price::discount_percentage(&regular, &sale),
        },
        None => Pricing {
            price,
            regular_price,
            sale_price,
            display_price: price.or(regular_price),
            compare_at_price: None,
            is_on_sale: false,
            discount_percentage: None,
        },
    }
}

/// Stock fields: `(in_stock, low_stock, max_quantity)`.
///
/// A reported quantity only gates eligibility when it is present; products
/// without stock management rely on the status alone.
fn derive_stock(
    status: StockStatus,
    manage_stock: bool,
    quantity: Option<i64>,
    purchasable: bool,
) -> (bool, bool, u32) {
    let in_stock = purchasable && status == StockStatus::InStock && quantity.is_none_or(|q| q > 0);

    let managed = quantity.filter(|_| manage_stock);
    let low_stock = managed.is_some_and(|q| (1..=LOW_STOCK_THRESHOLD).contains(&q));
    let max_quantity = managed.map_or(MAX_LINE_QUANTITY, |q| {
        u32::try_from(q.clamp(1, i64::from(MAX_LINE_QUANTITY))).unwrap_or(MAX_LINE_QUANTITY)
    });

    (in_stock, low_stock, max_quantity)
}

fn meta_flag(meta: &[MetaData], key: &str) -> bool {
    meta.iter().any(|m| m.key == key && value_is_truthy(&m.value))
}

/// Lower-cased option values of storage-related attributes.
fn storage_phrases(attributes: &[ProductAttributeRecord]) -> Vec<String> {
    attributes
        .iter()
        .filter(|a| {
            let name = a.name.to_lowercase();
            name.contains("storage") || name.contains("lagerung")
        })
        .flat_map(|a| a.options.iter().map(|o| o.to_lowercase()))
        .collect()
}

fn classify_cold_chain(record: &ProductRecord) -> ColdChainClass {
    let slugs: Vec<&str> = record
        .categories
        .iter()
        .chain(&record.tags)
        .map(|t| t.slug.as_str())
        .collect();
    let storage = storage_phrases(&record.attributes);
    let storage_mentions =
        |phrases: &[&str]| storage.iter().any(|s| phrases.iter().any(|p| s.contains(p)));

    if slugs.iter().any(|s| FROZEN_SLUGS.contains(s)) || storage_mentions(FROZEN_PHRASES) {
        return ColdChainClass::Frozen;
    }

    if slugs.iter().any(|s| REFRIGERATED_SLUGS.contains(s))
        || storage_mentions(REFRIGERATED_PHRASES)
        || meta_flag(&record.meta_data, COLD_CHAIN_META)
    {
        return ColdChainClass::Refrigerated;
    }

    ColdChainClass::Ambient
}

fn requires_prescription(record: &ProductRecord) -> bool {
    record
        .categories
        .iter()
        .chain(&record.tags)
        .any(|t| PRESCRIPTION_SLUGS.contains(&t.slug.as_str()))
        || meta_flag(&record.meta_data, PRESCRIPTION_META)
}

fn image_view(image: &ImageRecord, fallback_alt: &str) -> Option<ImageView> {
    if image.src.is_empty() {
        return None;
    }
    let alt = if image.alt.trim().is_empty() {
        fallback_alt.to_string()
    } else {
        image.alt.clone()
    };
    Some(ImageView {
        src: image.src.clone(),
        alt,
    })
}

/// Strip markup from an HTML fragment and collapse whitespace.
#[must_use]
pub fn strip_html(html: &str) -> String {
    let text = TAG_RE.replace_all(html, " ");
    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&#8217;", "’")
        .replace("&#8211;", "–")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

// =============================================================================
// Mapping
// =============================================================================

/// Map a product record into its view model.
#[must_use]
pub fn map_product(record: &ProductRecord, currency: CurrencyCode) -> ProductView {
    let pricing = derive_pricing(
        &record.price,
        &record.regular_price,
        &record.sale_price,
        currency,
    );
    let (in_stock, low_stock, max_quantity) = derive_stock(
        record.stock_status,
        record.manage_stock,
        record.stock_quantity,
        record.purchasable,
    );

    let kind = match record.kind.as_str() {
        "simple" | "" => ProductKind::Simple,
        "variable" => ProductKind::Variable,
        _ => ProductKind::Other,
    };

    let term = |t: &TermRef| TermView {
        id: t.id,
        slug: t.slug.clone(),
        name: t.name.clone(),
    };

    let mut attributes: Vec<&ProductAttributeRecord> =
        record.attributes.iter().filter(|a| a.visible).collect();
    attributes.sort_by_key(|a| a.position);

    ProductView {
        id: record.id,
        slug: record.slug.clone(),
        name: record.name.clone(),
        kind,
        short_description: strip_html(&record.short_description),
        description_html: record.description.clone(),
        sku: record.sku.clone(),
        price: pricing.price,
        regular_price: pricing.regular_price,
        sale_price: pricing.sale_price,
        display_price: pricing.display_price,
        compare_at_price: pricing.compare_at_price,
        is_on_sale: pricing.is_on_sale,
        discount_percentage: pricing.discount_percentage,
        stock_status: record.stock_status,
        stock_quantity: record.stock_quantity,
        in_stock,
        low_stock,
        cold_chain: classify_cold_chain(record),
        requires_prescription: requires_prescription(record),
        images: record
            .images
            .iter()
            .filter_map(|i| image_view(i, &record.name))
            .collect(),
        categories: record.categories.iter().map(term).collect(),
        tags: record.tags.iter().map(term).collect(),
        attributes: attributes
            .into_iter()
            .map(|a| ProductAttributeView {
                name: a.name.clone(),
                values: a.options.clone(),
            })
            .collect(),
        variation_ids: record.variations.clone(),
        cross_sell_ids: record.cross_sell_ids.clone(),
        rating: record
            .average_rating
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|r| *r > 0.0),
        review_count: record.rating_count,
        max_quantity,
    }
}

/// Map a batch of product records.
#[must_use]
pub fn map_products(records: &[ProductRecord], currency: CurrencyCode) -> Vec<ProductView> {
    records.iter().map(|r| map_product(r, currency)).collect()
}

/// Map a variation record. `parent_name` is used as image alt fallback.
#[must_use]
pub fn map_variation(
    record: &VariationRecord,
    parent_name: &str,
    currency: CurrencyCode,
) -> VariationView {
    let pricing = derive_pricing(
        &record.price,
        &record.regular_price,
        &record.sale_price,
        currency,
    );
    let (in_stock, low_stock, max_quantity) = derive_stock(
        record.stock_status,
        record.manage_stock,
        record.stock_quantity,
        record.purchasable,
    );

    VariationView {
        id: record.id,
        sku: record.sku.clone(),
        attributes: record
            .attributes
            .iter()
            .map(|a| format!("{}: {}", a.name, a.option))
            .collect(),
        price: pricing.price,
        regular_price: pricing.regular_price,
        sale_price: pricing.sale_price,
        display_price: pricing.display_price,
        compare_at_price: pricing.compare_at_price,
        is_on_sale: pricing.is_on_sale,
        discount_percentage: pricing.discount_percentage,
        stock_status: record.stock_status,
        stock_quantity: record.stock_quantity,
        in_stock,
        low_stock,
        max_quantity,
        image: record
            .image
            .as_ref()
            .and_then(|i| image_view(i, parent_name)),
    }
}

/// Map a category record.
#[must_use]
pub fn map_category(record: &CategoryRecord) -> CategoryView {
    CategoryView {
        id: record.id,
        slug: record.slug.clone(),
        name: strip_html(&record.name),
        parent: (record.parent != 0).then(|| CategoryId::new(record.parent)),
        description: strip_html(&record.description),
        image: record
            .image
            .as_ref()
            .and_then(|i| image_view(i, &record.name)),
        count: record.count,
    }
}

/// Map a tag record.
#[must_use]
pub fn map_tag(record: &TagRecord) -> TagView {
    TagView {
        id: record.id,
        slug: record.slug.clone(),
        name: record.name.clone(),
        description: strip_html(&record.description),
        count: record.count,
    }
}

/// Map a global attribute and its terms.
#[must_use]
pub fn map_attribute(record: &AttributeRecord, terms: &[AttributeTermRecord]) -> AttributeView {
    AttributeView {
        id: record.id,
        slug: record.slug.clone(),
        name: record.name.clone(),
        terms: terms
            .iter()
            .map(|t| AttributeTermView {
                slug: t.slug.clone(),
                name: t.name.clone(),
                count: t.count,
            })
            .collect(),
    }
}

// =============================================================================
// Category tree
// =============================================================================

/// Nest categories by parent.
///
/// Siblings are sorted by name. Categories whose parent is unknown become
/// roots, and so does any category only reachable through a parent cycle.
#[must_use]
pub fn category_tree(categories: &[CategoryView]) -> Vec<CategoryNode> {
    let known: HashSet<CategoryId> = categories.iter().map(|c| c.id).collect();
    let mut children: HashMap<CategoryId, Vec<&CategoryView>> = HashMap::new();
    let mut roots: Vec<&CategoryView> = Vec::new();

    for category in categories {
        match category.parent {
            Some(parent) if parent != category.id && known.contains(&parent) => {
                children.entry(parent).or_default().push(category);
            }
            _ => roots.push(category),
        }
    }

    let mut visited = HashSet::new();
    let mut tree = build_level(roots, &children, &mut visited);

    let stranded: Vec<&CategoryView> = categories
        .iter()
        .filter(|c| !visited.contains(&c.id))
        .collect();
    if !stranded.is_empty() {
        tracing::warn!(count = stranded.len(), "Category parent cycle detected");
        let mut rest = Vec::new();
        for category in stranded {
            if !visited.contains(&category.id) {
                rest.extend(build_level(vec![category], &children, &mut visited));
            }
        }
        tree.extend(rest);
        sort_nodes(&mut tree);
    }

    tree
}

fn build_level(
    mut level: Vec<&CategoryView>,
    children: &HashMap<CategoryId, Vec<&CategoryView>>,
    visited: &mut HashSet<CategoryId>,
) -> Vec<CategoryNode> {
    level.retain(|c| visited.insert(c.id));
    let mut nodes: Vec<CategoryNode> = level
        .into_iter()
        .map(|category| {
            let kids = children.get(&category.id).cloned().unwrap_or_default();
            CategoryNode {
                category: category.clone(),
                children: build_level(kids, children, visited),
            }
        })
        .collect();
    sort_nodes(&mut nodes);
    nodes
}

fn sort_nodes(nodes: &mut [CategoryNode]) {
    nodes.sort_by(|a, b| {
        a.category
            .name
            .to_lowercase()
            .cmp(&b.category.name.to_lowercase())
            .then_with(|| a.category.id.cmp(&b.category.id))
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product(value: serde_json::Value) -> ProductView {
        let record: ProductRecord = serde_json::from_value(value).unwrap();
        map_product(&record, CurrencyCode::EUR)
    }

    fn category(id: u64, name: &str, parent: u64) -> CategoryView {
        map_category(&CategoryRecord {
            id: CategoryId::new(id),
            name: name.to_string(),
            slug: name.to_lowercase(),
            parent,
            ..CategoryRecord::default()
        })
    }

    #[test]
    fn test_sale_pricing() {
        let view = product(json!({
            "id": 1, "name": "Ibuprofen 400", "purchasable": true,
            "price": "7.99", "regular_price": "9.99", "sale_price": "7.99",
            "stock_status": "instock"
        }));

        assert!(view.is_on_sale);
        assert_eq!(view.discount_percentage, Some(20));
        assert_eq!(view.display_price.unwrap().display(), "€7.99");
        assert_eq!(view.compare_at_price.unwrap().display(), "€9.99");
    }

    #[test]
    fn test_sale_price_not_below_regular_is_not_a_sale() {
        let view = product(json!({
            "id": 1, "price": "9.99", "regular_price": "9.99", "sale_price": "9.99"
        }));
        assert!(!view.is_on_sale);
        assert_eq!(view.discount_percentage, None);
        assert!(view.compare_at_price.is_none());
        assert_eq!(view.display_price.unwrap().display(), "€9.99");
    }

    #[test]
    fn test_in_stock_requires_status_quantity_and_purchasable() {
        let base = json!({
            "id": 1, "purchasable": true, "stock_status": "instock",
            "manage_stock": true, "stock_quantity": 3
        });
        let view = product(base.clone());
        assert!(view.in_stock);
        assert!(view.low_stock);
        assert_eq!(view.max_quantity, 3);

        let mut zero = base.clone();
        zero["stock_quantity"] = json!(0);
        assert!(!product(zero).in_stock);

        let mut unpurchasable = base.clone();
        unpurchasable["purchasable"] = json!(false);
        assert!(!product(unpurchasable).in_stock);

        let mut backorder = base;
        backorder["stock_status"] = json!("onbackorder");
        assert!(!product(backorder).in_stock);
    }

    #[test]
    fn test_unmanaged_stock_uses_status_only() {
        let view = product(json!({
            "id": 1, "purchasable": true, "stock_status": "instock", "stock_quantity": null
        }));
        assert!(view.in_stock);
        assert!(!view.low_stock);
        assert_eq!(view.max_quantity, MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_max_quantity_capped() {
        let view = product(json!({
            "id": 1, "purchasable": true, "stock_status": "instock",
            "manage_stock": true, "stock_quantity": 250
        }));
        assert_eq!(view.max_quantity, MAX_LINE_QUANTITY);
        assert!(!view.low_stock);
    }

    #[test]
    fn test_cold_chain_from_category() {
        let view = product(json!({
            "id": 1, "categories": [{ "id": 4, "name": "Insulin", "slug": "insulin" }]
        }));
        assert_eq!(view.cold_chain, ColdChainClass::Refrigerated);
    }

    #[test]
    fn test_cold_chain_from_storage_attribute() {
        let view = product(json!({
            "id": 1,
            "attributes": [{ "id": 0, "name": "Storage", "visible": true, "options": ["Store at 2–8 °C"] }]
        }));
        assert_eq!(view.cold_chain, ColdChainClass::Refrigerated);

        let frozen = product(json!({
            "id": 2,
            "attributes": [{ "id": 0, "name": "Storage", "options": ["Keep at -20 °C"] }]
        }));
        assert_eq!(frozen.cold_chain, ColdChainClass::Frozen);
    }

    #[test]
    fn test_frozen_wins_over_refrigerated() {
        let view = product(json!({
            "id": 1,
            "categories": [{ "id": 4, "slug": "vaccines" }],
            "tags": [{ "id": 9, "slug": "frozen" }]
        }));
        assert_eq!(view.cold_chain, ColdChainClass::Frozen);
    }

    #[test]
    fn test_cold_chain_and_prescription_meta() {
        let view = product(json!({
            "id": 1,
            "meta_data": [
                { "key": "_cold_chain", "value": "yes" },
                { "key": "_prescription_required", "value": true }
            ]
        }));
        assert_eq!(view.cold_chain, ColdChainClass::Refrigerated);
        assert!(view.requires_prescription);

        let plain = product(json!({ "id": 2, "tags": [{ "id": 1, "slug": "vitamins" }] }));
        assert_eq!(plain.cold_chain, ColdChainClass::Ambient);
        assert!(!plain.requires_prescription);
    }

    #[test]
    fn test_prescription_from_tag() {
        let view = product(json!({ "id": 1, "tags": [{ "id": 3, "slug": "rx" }] }));
        assert!(view.requires_prescription);
    }

    #[test]
    fn test_visible_attributes_sorted_by_position() {
        let view = product(json!({
            "id": 1,
            "attributes": [
                { "name": "Pack size", "position": 2, "visible": true, "options": ["20", "50"] },
                { "name": "Internal", "position": 0, "visible": false, "options": ["x"] },
                { "name": "Active ingredient", "position": 1, "visible": true, "options": ["Ibuprofen"] }
            ]
        }));
        let names: Vec<&str> = view.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Active ingredient", "Pack size"]);
        assert_eq!(view.attributes[1].joined(), "20, 50");
    }

    #[test]
    fn test_images_fall_back_to_product_name_alt() {
        let view = product(json!({
            "id": 1, "name": "Vitamin D3",
            "images": [{ "id": 1, "src": "https://cdn.example.com/d3.jpg", "alt": "" }, { "id": 2, "src": "" }]
        }));
        assert_eq!(view.images.len(), 1);
        assert_eq!(view.primary_image().unwrap().alt, "Vitamin D3");
    }

    #[test]
    fn test_variation_mapping() {
        let record: VariationRecord = serde_json::from_value(json!({
            "id": 11, "purchasable": true, "stock_status": "instock",
            "regular_price": "12.00", "sale_price": "9.00", "price": "9.00",
            "attributes": [{ "name": "Pack size", "option": "50" }]
        }))
        .unwrap();
        let view = map_variation(&record, "Vitamin C", CurrencyCode::EUR);

        assert_eq!(view.label(), "Pack size: 50");
        assert!(view.is_on_sale);
        assert_eq!(view.discount_percentage, Some(25));
        assert!(view.in_stock);
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(
            strip_html("<p>Fast&nbsp;relief from <strong>pain</strong> &amp; fever</p>\n"),
            "Fast relief from pain & fever"
        );
    }

    #[test]
    fn test_category_tree_nests_and_sorts() {
        let categories = vec![
            category(1, "Pain", 0),
            category(2, "Vitamins", 0),
            category(3, "Headache", 1),
            category(4, "Back pain", 1),
            category(5, "Orphan", 99),
        ];
        let tree = category_tree(&categories);

        let roots: Vec<&str> = tree.iter().map(|n| n.category.name.as_str()).collect();
        assert_eq!(roots, vec!["Orphan", "Pain", "Vitamins"]);

        let pain = tree.iter().find(|n| n.category.slug == "pain").unwrap();
        let kids: Vec<&str> = pain.children.iter().map(|n| n.category.name.as_str()).collect();
        assert_eq!(kids, vec!["Back pain", "Headache"]);
    }

    #[test]
    fn test_category_tree_breaks_cycles() {
        let categories = vec![category(1, "A", 2), category(2, "B", 1)];
        let tree = category_tree(&categories);
        let total: usize = tree.iter().map(|n| 1 + n.children.len()).sum();
        assert_eq!(total, 2);
    }
}
