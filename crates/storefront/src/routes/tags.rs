//! Tag route handler.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use tracing::instrument;

use crate::error::Result;
use crate::routes::Layout;
use crate::routes::categories::CategoryQuery;
use crate::routes::products::{ListingQuery, listing};
use crate::state::AppState;

/// Display the products carrying one tag.
///
/// # Errors
///
/// Returns 404 if the tag does not exist.
#[instrument(skip(state, layout))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<CategoryQuery>,
    layout: Layout,
) -> Result<impl IntoResponse> {
    let query = ListingQuery {
        page: query.page,
        sort: query.sort,
        tag: Some(slug),
        ..ListingQuery::default()
    };
    listing(&state, query, layout).await
}
