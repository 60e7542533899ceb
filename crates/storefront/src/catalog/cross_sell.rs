//! Rule-based cross-sell suggestions.
//!
//! A static table maps product signals (category, tag, cold-chain storage)
//! to categories worth suggesting alongside. Explicit cross-sells configured
//! in the commerce backend always come first.

use std::collections::HashSet;

use apoteka_core::{CurrencyCode, ProductId};
use futures::future::join_all;
use tracing::instrument;

use crate::commerce::{CommerceClient, ProductQuery};

use super::{ProductView, map_products};

/// Default number of suggestions shown on a product page.
pub const DEFAULT_LIMIT: usize = 4;

/// Products fetched per suggested category.
const CANDIDATES_PER_CATEGORY: u32 = 8;

/// Most suggested categories fetched for one product.
const MAX_SUGGESTED_CATEGORIES: usize = 3;

/// What makes a rule apply to a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Product is in the category with this slug.
    Category(&'static str),
    /// Product carries the tag with this slug.
    Tag(&'static str),
    /// Product must be shipped cold.
    ColdChain,
}

/// A cross-sell rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossSellRule {
    pub trigger: Trigger,
    /// Category slugs to draw suggestions from.
    pub suggest: &'static [&'static str],
    pub headline: &'static str,
}

impl CrossSellRule {
    /// Whether the rule applies to a product.
    #[must_use]
    pub fn matches(&self, product: &ProductView) -> bool {
        match self.trigger {
            Trigger::Category(slug) => product.in_category(slug),
            Trigger::Tag(slug) => product.has_tag(slug),
            Trigger::ColdChain => product.cold_chain.requires_cold_shipping(),
        }
    }
}

/// Rules in priority order.
pub const CROSS_SELL_RULES: &[CrossSellRule] = &[
    CrossSellRule {
        trigger: Trigger::ColdChain,
        suggest: &["cooling-bags"],
        headline: "Keep it cold on the way home",
    },
    CrossSellRule {
        trigger: Trigger::Category("insulin"),
        suggest: &["blood-glucose", "pen-needles"],
        headline: "Diabetes essentials",
    },
    CrossSellRule {
        trigger: Trigger::Category("cold-flu"),
        suggest: &["vitamins", "throat-lozenges"],
        headline: "Get back on your feet",
    },
    CrossSellRule {
        trigger: Trigger::Category("pain-relief"),
        suggest: &["heat-patches", "cooling-gels"],
        headline: "Often bought for aches and pains",
    },
    CrossSellRule {
        trigger: Trigger::Tag("antibiotic"),
        suggest: &["probiotics"],
        headline: "Support your gut",
    },
    CrossSellRule {
        trigger: Trigger::Category("baby"),
        suggest: &["baby-care", "thermometers"],
        headline: "For little ones",
    },
    CrossSellRule {
        trigger: Trigger::Tag("travel"),
        suggest: &["travel-kits", "sun-protection"],
        headline: "Pack for the trip",
    },
    CrossSellRule {
        trigger: Trigger::Category("skin-care"),
        suggest: &["sun-protection"],
        headline: "Complete your routine",
    },
];

/// Rules that apply to a product, in table order.
#[must_use]
pub fn matching_rules(product: &ProductView) -> Vec<&'static CrossSellRule> {
    CROSS_SELL_RULES
        .iter()
        .filter(|rule| rule.matches(product))
        .collect()
}

/// Headline of the first matching rule.
#[must_use]
pub fn headline(product: &ProductView) -> &'static str {
    matching_rules(product)
        .first()
        .map_or("Customers also bought", |rule| rule.headline)
}

/// Category slugs to draw suggestions from, deduplicated in rule order and
/// excluding categories the product is already in.
#[must_use]
pub fn suggested_categories(product: &ProductView, limit: usize) -> Vec<&'static str> {
    let mut seen = HashSet::new();
    matching_rules(product)
        .into_iter()
        .flat_map(|rule| rule.suggest.iter().copied())
        .filter(|slug| !product.in_category(slug))
        .filter(|slug| seen.insert(*slug))
        .take(limit)
        .collect()
}

/// Pick suggestions from a candidate pool.
///
/// Explicit cross-sells of `product` come first in their configured order,
/// then the remaining candidates in pool order. The product itself,
/// duplicates and anything not purchasable right now are dropped.
#[must_use]
pub fn recommend(product: &ProductView, candidates: &[ProductView], limit: usize) -> Vec<ProductView> {
    let explicit = product.cross_sell_ids.iter().filter_map(|id| {
        candidates.iter().find(|c| c.id == *id)
    });
    let rest = candidates
        .iter()
        .filter(|c| !product.cross_sell_ids.contains(&c.id));

    let mut seen: HashSet<ProductId> = HashSet::new();
    explicit
        .chain(rest)
        .filter(|c| c.id != product.id && c.in_stock)
        .filter(|c| seen.insert(c.id))
        .take(limit)
        .cloned()
        .collect()
}

/// Fetch candidates for a product and pick suggestions.
///
/// Explicit cross-sells and every suggested category are fetched
/// concurrently. Any failing request contributes nothing.
#[instrument(skip(commerce, product), fields(product_id = %product.id))]
pub async fn load_recommendations(
    commerce: &CommerceClient,
    product: &ProductView,
    currency: CurrencyCode,
    limit: usize,
) -> Vec<ProductView> {
    let categories = suggested_categories(product, MAX_SUGGESTED_CATEGORIES);

    let explicit = async {
        if product.cross_sell_ids.is_empty() {
            return Vec::new();
        }
        let query = ProductQuery {
            include: product.cross_sell_ids.clone(),
            per_page: u32::try_from(product.cross_sell_ids.len()).unwrap_or(ProductQuery::MAX_PER_PAGE),
            ..ProductQuery::default()
        };
        match commerce.list_products(&query).await {
            Ok(page) => page.products,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch explicit cross-sells");
                Vec::new()
            }
        }
    };

    let by_category = join_all(categories.into_iter().map(|slug| async move {
        let category = match commerce.get_category_by_slug(slug).await {
            Ok(category) => category,
            Err(e) => {
                tracing::debug!(slug = %slug, error = %e, "Suggested category unavailable");
                return Vec::new();
            }
        };
        let query = ProductQuery {
            category: Some(category.id),
            per_page: CANDIDATES_PER_CATEGORY,
            ..ProductQuery::default()
        };
        match commerce.list_products(&query).await {
            Ok(page) => page.products,
            Err(e) => {
                tracing::warn!(slug = %slug, error = %e, "Failed to fetch cross-sell candidates");
                Vec::new()
            }
        }
    }));

    let (explicit, by_category) = futures::join!(explicit, by_category);

    let records: Vec<_> = explicit
        .into_iter()
        .chain(by_category.into_iter().flatten())
        .collect();

    recommend(product, &map_products(&records, currency), limit)
}
