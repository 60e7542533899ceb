//! Search route handler.
//!
//! Search is delegated to the commerce API's full-text `search` parameter.
//! Search results are never cached.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use crate::commerce::{ProductPage, ProductSort};
use crate::error::Result;
use crate::routes::Layout;
use crate::routes::products::{ListingQuery, Pager, ProductsIndexTemplate, listing, sort_options};
use crate::state::AppState;

/// Longest search phrase forwarded upstream.
const MAX_QUERY_CHARS: usize = 100;

/// Search query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub page: Option<u32>,
    pub sort: Option<String>,
}

/// Trim and cap a search phrase.
fn normalize_query(q: &str) -> String {
    q.trim().chars().take(MAX_QUERY_CHARS).collect::<String>().trim_end().to_string()
}

/// Display search results. An empty query renders the empty search page.
///
/// # Errors
///
/// Never fails for search input; upstream failures render no results.
#[instrument(skip(state, layout))]
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    layout: Layout,
) -> Result<impl IntoResponse> {
    let q = normalize_query(&query.q);
    if q.is_empty() {
        return Ok(ProductsIndexTemplate {
            layout,
            heading: "Search".to_string(),
            description: "Search by product name, brand or active ingredient.".to_string(),
            products: Vec::new(),
            pager: Pager::from_page(&ProductPage::default(), String::new()),
            sort_options: sort_options(ProductSort::default()),
            hidden_filters: Vec::new(),
        });
    }

    let query = ListingQuery {
        page: query.page,
        sort: query.sort,
        q: Some(q),
        ..ListingQuery::default()
    };
    listing(&state, query, layout).await
}
