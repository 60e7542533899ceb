//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::catalog::cross_sell::{self, DEFAULT_LIMIT};
use crate::catalog::{ProductView, VariationView, map_product, map_products, map_variation};
use crate::commerce::{ProductPage, ProductQuery, ProductSort};
use crate::error::Result;
use crate::filters;
use crate::models::{Wishlist, session_keys};
use crate::routes::{Layout, or_empty, page_or_first};
use crate::state::AppState;

/// Listing query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub page: Option<u32>,
    pub sort: Option<String>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub q: Option<String>,
}

/// A sort dropdown entry.
#[derive(Debug, Clone)]
pub struct SortOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

/// Sort dropdown entries with `current` selected.
#[must_use]
pub fn sort_options(current: ProductSort) -> Vec<SortOption> {
    ProductSort::ALL
        .into_iter()
        .map(|sort| SortOption {
            value: sort.as_str(),
            label: sort.label(),
            selected: sort == current,
        })
        .collect()
}

/// Pagination state for listing templates.
#[derive(Debug, Clone)]
pub struct Pager {
    pub page: u32,
    pub total_pages: u32,
    pub total: u64,
    /// Query string without `page`, e.g. `sort=title&category=vitamins&`.
    pub base_query: String,
}

impl Pager {
    #[must_use]
    pub fn from_page(page: &ProductPage, base_query: String) -> Self {
        Self {
            page: page.page.max(1),
            total_pages: page.total_pages,
            total: page.total,
            base_query,
        }
    }

    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    #[must_use]
    pub const fn prev(&self) -> u32 {
        self.page.saturating_sub(1)
    }

    #[must_use]
    pub const fn next(&self) -> u32 {
        self.page.saturating_add(1)
    }
}

/// Encode `pairs` as a query prefix ending in `&`, skipping empty values.
#[must_use]
pub fn base_query(pairs: &[(&str, Option<&str>)]) -> String {
    pairs
        .iter()
        .filter_map(|(key, value)| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| format!("{key}={}&", urlencoding::encode(v)))
        })
        .collect()
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub layout: Layout,
    pub heading: String,
    pub description: String,
    pub products: Vec<ProductView>,
    pub pager: Pager,
    pub sort_options: Vec<SortOption>,
    /// Hidden inputs that keep the current filter when changing sort.
    pub hidden_filters: Vec<(&'static str, String)>,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub layout: Layout,
    pub product: ProductView,
    pub variations: Vec<VariationView>,
    pub recommendations: Vec<ProductView>,
    pub cross_sell_headline: &'static str,
    pub wishlisted: bool,
}

/// Display the product listing page.
///
/// # Errors
///
/// Returns 404 for unknown filter slugs, or 502 if resolving them fails.
#[instrument(skip(state, layout))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
    layout: Layout,
) -> Result<impl IntoResponse> {
    listing(&state, query, layout).await
}

/// Build a listing page. Shared by the category, tag and search pages.
///
/// Unknown `category` or `tag` slugs are a 404. A failing product fetch
/// renders an empty listing.
pub(crate) async fn listing(
    state: &AppState,
    query: ListingQuery,
    layout: Layout,
) -> Result<ProductsIndexTemplate> {
    let commerce = state.commerce();
    let sort = query
        .sort
        .as_deref()
        .and_then(ProductSort::from_param)
        .unwrap_or_default();

    let mut product_query = ProductQuery {
        page: page_or_first(query.page),
        sort,
        search: query.q.clone(),
        ..ProductQuery::default()
    };
    let mut heading = "All products".to_string();
    let mut description = String::new();
    let mut hidden_filters = Vec::new();

    if let Some(slug) = query.category.as_deref().filter(|s| !s.is_empty()) {
        let category = crate::catalog::map_category(&commerce.get_category_by_slug(slug).await?);
        product_query.category = Some(category.id);
        heading = category.name;
        description = category.description;
        hidden_filters.push(("category", slug.to_string()));
    }
    if let Some(slug) = query.tag.as_deref().filter(|s| !s.is_empty()) {
        let tag = crate::catalog::map_tag(&commerce.get_tag_by_slug(slug).await?);
        product_query.tag = Some(tag.id);
        heading = format!("Tagged \u{201c}{}\u{201d}", tag.name);
        hidden_filters.push(("tag", slug.to_string()));
    }
    if let Some(q) = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        if hidden_filters.is_empty() {
            heading = format!("Results for \u{201c}{q}\u{201d}");
        }
        hidden_filters.push(("q", q.to_string()));
    }

    let page = or_empty(
        commerce.list_products(&product_query).await,
        "product listing",
    );
    let base = base_query(&[
        ("sort", Some(sort.as_str())),
        ("category", query.category.as_deref()),
        ("tag", query.tag.as_deref()),
        ("q", query.q.as_deref()),
    ]);

    Ok(ProductsIndexTemplate {
        layout,
        heading,
        description,
        products: map_products(&page.products, state.currency()),
        pager: Pager::from_page(&page, base),
        sort_options: sort_options(sort),
        hidden_filters,
    })
}

/// Display a product with its variations and cross-sell suggestions.
///
/// # Errors
///
/// Returns 404 if no published product has this slug, or 502 if the
/// commerce API fails.
#[instrument(skip(state, session, layout))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    session: Session,
    layout: Layout,
) -> Result<impl IntoResponse> {
    let commerce = state.commerce();
    let currency = state.currency();

    let record = commerce.get_product_by_slug(&slug).await?;
    let product = map_product(&record, currency);

    let variations = async {
        if !product.is_variable() {
            return Vec::<VariationView>::new();
        }
        let records = or_empty(commerce.list_variations(product.id).await, "variations");
        records
            .iter()
            .map(|v| map_variation(v, &product.name, currency))
            .collect()
    };
    let recommendations =
        cross_sell::load_recommendations(commerce, &product, currency, DEFAULT_LIMIT);

    let (variations, recommendations) = futures::join!(variations, recommendations);

    let wishlist: Wishlist = crate::models::session::load(&session, session_keys::WISHLIST).await?;

    Ok(ProductShowTemplate {
        layout,
        wishlisted: wishlist.contains(product.id),
        cross_sell_headline: cross_sell::headline(&product),
        product,
        variations,
        recommendations,
    })
}
