//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::catalog::{CategoryView, ProductView, category_tree, map_category, map_products};
use crate::commerce::{CommerceError, ProductQuery};
use crate::content::{Banner, ContentError, Post};
use crate::filters;
use crate::routes::{Layout, or_empty};
use crate::state::AppState;

const FEATURED_COUNT: u32 = 8;
const ON_SALE_COUNT: u32 = 4;
const LATEST_POSTS_COUNT: u32 = 3;
const TOP_CATEGORIES_COUNT: usize = 8;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub layout: Layout,
    pub banners: Vec<Banner>,
    pub featured: Vec<ProductView>,
    pub on_sale: Vec<ProductView>,
    pub categories: Vec<CategoryView>,
    pub posts: Vec<Post>,
}

/// Display the home page.
///
/// Every section is fetched concurrently and renders empty when its
/// upstream fails.
#[instrument(skip(state, layout))]
pub async fn home(State(state): State<AppState>, layout: Layout) -> impl IntoResponse {
    let commerce = state.commerce();
    let currency = state.currency();

    let featured_query = ProductQuery {
        featured: true,
        per_page: FEATURED_COUNT,
        ..ProductQuery::default()
    };
    let on_sale_query = ProductQuery {
        on_sale: true,
        per_page: ON_SALE_COUNT,
        ..ProductQuery::default()
    };

    let banners = async {
        match state.content() {
            Some(content) => content.list_banners().await,
            None => Ok(Vec::new()),
        }
    };
    let posts = async {
        match state.content() {
            Some(content) => content
                .list_posts(1, LATEST_POSTS_COUNT)
                .await
                .map(|page| page.posts),
            None => Ok::<_, ContentError>(Vec::new()),
        }
    };

    let (featured, on_sale, categories, banners, posts) = tokio::join!(
        commerce.list_products(&featured_query),
        commerce.list_products(&on_sale_query),
        commerce.list_categories(),
        banners,
        posts,
    );

    let featured = featured.map(|page| map_products(&page.products, currency));
    let on_sale = on_sale.map(|page| map_products(&page.products, currency));
    let categories = categories.map(|records| {
        let views: Vec<CategoryView> = records.iter().map(map_category).collect();
        category_tree(&views)
            .into_iter()
            .map(|node| node.category)
            .take(TOP_CATEGORIES_COUNT)
            .collect::<Vec<_>>()
    });

    HomeTemplate {
        layout,
        banners: or_empty(banners, "banners"),
        featured: or_empty::<_, CommerceError>(featured, "featured products"),
        on_sale: or_empty(on_sale, "on-sale products"),
        categories: or_empty(categories, "categories"),
        posts: or_empty(posts, "latest posts"),
    }
}
