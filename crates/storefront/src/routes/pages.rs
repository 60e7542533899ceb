//! Static content page route handler.
//!
//! Pages such as terms, privacy or pharmacy information come from the CMS.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::instrument;

use crate::content::Page;
use crate::error::{AppError, Result};
use crate::filters;
use crate::routes::Layout;
use crate::state::AppState;

/// Content page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/show.html")]
pub struct PageTemplate {
    pub layout: Layout,
    pub page: Page,
}

impl PageTemplate {
    /// Last update formatted for the footer line.
    #[must_use]
    pub fn updated_label(&self) -> Option<String> {
        self.page
            .updated_at
            .map(|d| d.format("%B %-d, %Y").to_string())
    }
}

/// Display a page by slug.
///
/// # Errors
///
/// Returns 404 if the page doesn't exist or no CMS is configured, 502 if
/// the CMS fails.
#[instrument(skip(state, layout))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    layout: Layout,
) -> Result<impl IntoResponse> {
    let content = state
        .content()
        .ok_or_else(|| AppError::NotFound(format!("page {slug}")))?;
    let page = content.get_page(&slug).await?;
    Ok(PageTemplate { layout, page })
}
