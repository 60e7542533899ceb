//! Content API client (blog posts, static pages and home page banners).
//!
//! The CMS exposes a Strapi-v4-shaped REST API: every collection lives at
//! `{base}/api/{collection}` and answers with
//! `{ "data": [{ "id", "attributes" }], "meta": { "pagination" } }`.
//! Bodies are Markdown and are rendered to HTML once, when a response is
//! fetched, then cached alongside the other fields.

mod client;
mod markdown;
pub mod types;

pub use client::ContentClient;
pub use markdown::{reading_time_minutes, render_markdown};
pub use types::{Banner, Page, Post, PostPage};

use thiserror::Error;

/// Errors that can occur when talking to the content API.
#[derive(Debug, Error)]
pub enum ContentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Entry not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
