//! Blog route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use crate::content::{Post, PostPage};
use crate::error::{AppError, Result};
use crate::filters;
use crate::routes::{Layout, or_empty, page_or_first};
use crate::state::AppState;

/// Posts per blog index page.
const POSTS_PER_PAGE: u32 = 9;

/// Number of recent posts shown under a post.
const RECENT_POSTS_COUNT: usize = 3;

/// One extra in case the current post is among the latest.
const RECENT_POSTS_FETCH: u32 = 4;

/// Blog index query parameters.
#[derive(Debug, Deserialize)]
pub struct BlogQuery {
    pub page: Option<u32>,
}

/// Blog index page template.
#[derive(Template, WebTemplate)]
#[template(path = "blog/index.html")]
pub struct BlogIndexTemplate {
    pub layout: Layout,
    pub posts: Vec<Post>,
    pub page: u32,
    pub has_next: bool,
}

/// Blog post detail template.
#[derive(Template, WebTemplate)]
#[template(path = "blog/show.html")]
pub struct BlogShowTemplate {
    pub layout: Layout,
    pub post: Post,
    pub recent_posts: Vec<Post>,
}

/// Display a page of published posts, newest first.
///
/// Renders an empty list when the CMS is not configured or unavailable.
#[instrument(skip(state, layout))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<BlogQuery>,
    layout: Layout,
) -> impl IntoResponse {
    let page = page_or_first(query.page);
    let posts = match state.content() {
        Some(content) => or_empty(content.list_posts(page, POSTS_PER_PAGE).await, "blog posts"),
        None => PostPage::default(),
    };

    BlogIndexTemplate {
        layout,
        has_next: posts.has_next(),
        posts: posts.posts,
        page,
    }
}

/// Display a single post by slug.
///
/// # Errors
///
/// Returns 404 if the post doesn't exist or no CMS is configured, 502 if
/// the CMS fails.
#[instrument(skip(state, layout))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    layout: Layout,
) -> Result<impl IntoResponse> {
    let content = state
        .content()
        .ok_or_else(|| AppError::NotFound(format!("post {slug}")))?;

    let (post, recent) = futures::join!(
        content.get_post(&slug),
        content.list_posts(1, RECENT_POSTS_FETCH),
    );
    let post = post?;

    let recent_posts = or_empty(recent, "recent posts")
        .posts
        .into_iter()
        .filter(|p| p.slug != post.slug)
        .take(RECENT_POSTS_COUNT)
        .collect();

    Ok(BlogShowTemplate {
        layout,
        post,
        recent_posts,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::routes::tests::{get_request, test_app};
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_index_without_cms_renders_empty() {
        let response = test_app().oneshot(get_request("/blog", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_post_without_cms_is_not_found() {
        let response = test_app()
            .oneshot(get_request("/blog/travel-pharmacy-checklist", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
