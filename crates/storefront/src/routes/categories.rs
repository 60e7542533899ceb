//! Category route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use futures::future::join_all;
use serde::Deserialize;
use tracing::instrument;

use crate::catalog::{AttributeView, CategoryNode, CategoryView, category_tree, map_attribute, map_category};
use crate::commerce::CommerceClient;
use crate::error::Result;
use crate::filters;
use crate::routes::products::{ListingQuery, listing};
use crate::routes::{Layout, or_empty};
use crate::state::AppState;

/// A category with its depth in the tree, for indented rendering.
#[derive(Debug, Clone)]
pub struct CategoryRow {
    pub depth: usize,
    pub category: CategoryView,
}

/// Flatten a category tree depth-first.
#[must_use]
pub fn flatten_tree(nodes: &[CategoryNode]) -> Vec<CategoryRow> {
    fn walk(nodes: &[CategoryNode], depth: usize, rows: &mut Vec<CategoryRow>) {
        for node in nodes {
            rows.push(CategoryRow {
                depth,
                category: node.category.clone(),
            });
            walk(&node.children, depth + 1, rows);
        }
    }

    let mut rows = Vec::new();
    walk(nodes, 0, &mut rows);
    rows
}

/// Category index template.
#[derive(Template, WebTemplate)]
#[template(path = "categories/index.html")]
pub struct CategoriesIndexTemplate {
    pub layout: Layout,
    pub rows: Vec<CategoryRow>,
    pub attributes: Vec<AttributeView>,
}

/// Category listing query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    pub page: Option<u32>,
    pub sort: Option<String>,
}

/// Global attributes with their terms. Attributes whose terms fail to load
/// are shown without terms.
async fn load_attributes(commerce: &CommerceClient) -> Vec<AttributeView> {
    let records = or_empty(commerce.list_attributes().await, "attributes");
    join_all(records.iter().map(|record| async move {
        let terms = or_empty(
            commerce.list_attribute_terms(record.id).await,
            "attribute terms",
        );
        map_attribute(record, &terms)
    }))
    .await
}

/// Display the category tree and the attribute index.
#[instrument(skip(state, layout))]
pub async fn index(State(state): State<AppState>, layout: Layout) -> impl IntoResponse {
    let commerce = state.commerce();
    let (categories, attributes) =
        futures::join!(commerce.list_categories(), load_attributes(commerce));

    let views: Vec<CategoryView> = or_empty(categories, "categories")
        .iter()
        .map(map_category)
        .collect();

    CategoriesIndexTemplate {
        layout,
        rows: flatten_tree(&category_tree(&views)),
        attributes,
    }
}

/// Display the products of one category.
///
/// # Errors
///
/// Returns 404 if the category does not exist.
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
        category: Some(slug),
        ..ListingQuery::default()
    };
    listing(&state, query, layout).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use apoteka_core::CategoryId;

    fn category(id: u64, name: &str, parent: Option<u64>) -> CategoryView {
        CategoryView {
            id: CategoryId::new(id),
            slug: name.to_lowercase(),
            name: name.to_string(),
            parent: parent.map(CategoryId::new),
            description: String::new(),
            image: None,
            count: 1,
        }
    }

    #[test]
    fn test_flatten_tree_depth_first() {
        let views = vec![
            category(1, "Medicine", None),
            category(2, "Pain", Some(1)),
            category(3, "Beauty", None),
            category(4, "Headache", Some(2)),
        ];
        let rows = flatten_tree(&category_tree(&views));
        let shape: Vec<(usize, &str)> = rows
            .iter()
            .map(|r| (r.depth, r.category.name.as_str()))
            .collect();
        assert_eq!(
            shape,
            vec![(0, "Beauty"), (0, "Medicine"), (1, "Pain"), (2, "Headache")]
        );
    }
}
