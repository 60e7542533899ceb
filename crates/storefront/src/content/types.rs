//! Content API response shapes and the rendered records handed to templates.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::markdown::{excerpt_from_markdown, reading_time_minutes, render_markdown};

/// Excerpt length used when an entry has no explicit excerpt.
const EXCERPT_CHARS: usize = 180;

// =============================================================================
// Envelope
// =============================================================================

/// `{ "data": [...], "meta": { "pagination": ... } }`
#[derive(Debug, Deserialize)]
pub(crate) struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<Entry<T>>,
    #[serde(default)]
    pub meta: Meta,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Entry<T> {
    pub id: u64,
    pub attributes: T,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Meta {
    #[serde(default)]
    pub pagination: Pagination,
}

/// Pagination block of a collection response.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub page_count: u32,
    pub total: u64,
}

/// A single media relation (`{ "data": { "id", "attributes": { "url" } } }`).
#[derive(Debug, Default, Deserialize)]
pub(crate) struct MediaRelation {
    #[serde(default)]
    pub data: Option<Entry<MediaAttributes>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct MediaAttributes {
    pub url: String,
    pub alternative_text: Option<String>,
}

impl MediaRelation {
    /// Absolute URL and alt text, resolving uploads relative to the CMS.
    fn resolve(self, base_url: &str) -> Option<(String, String)> {
        let media = self.data?.attributes;
        if media.url.is_empty() {
            return None;
        }
        let url = if media.url.starts_with('/') {
            format!("{base_url}{}", media.url)
        } else {
            media.url
        };
        Some((url, media.alternative_text.unwrap_or_default()))
    }
}

// =============================================================================
// Raw attributes
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct PostAttributes {
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub body: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub cover: Option<MediaRelation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct PageAttributes {
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub body: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct BannerAttributes {
    pub title: String,
    pub subtitle: Option<String>,
    pub link_url: Option<String>,
    pub cta_label: Option<String>,
    pub position: i64,
    pub image: Option<MediaRelation>,
}

// =============================================================================
// Rendered records
// =============================================================================

/// A blog post with its body rendered to HTML.
#[derive(Debug, Clone)]
pub struct Post {
    pub id: u64,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub cover_url: Option<String>,
    pub cover_alt: String,
    pub content_html: String,
    pub reading_time_minutes: u32,
}

impl Post {
    pub(crate) fn from_entry(entry: Entry<PostAttributes>, base_url: &str) -> Self {
        let attrs = entry.attributes;
        let body = attrs.body.unwrap_or_default();
        let excerpt = attrs
            .excerpt
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| excerpt_from_markdown(&body, EXCERPT_CHARS));
        let (cover_url, cover_alt) = match attrs.cover.and_then(|c| c.resolve(base_url)) {
            Some((url, alt)) => (Some(url), alt),
            None => (None, String::new()),
        };

        Self {
            id: entry.id,
            slug: attrs.slug,
            title: attrs.title,
            excerpt,
            author: attrs.author.filter(|a| !a.trim().is_empty()),
            published_at: attrs.published_at,
            updated_at: attrs.updated_at,
            cover_url,
            cover_alt,
            content_html: render_markdown(&body),
            reading_time_minutes: reading_time_minutes(&body),
        }
    }

    /// Publication date formatted for listings (e.g., "March 4, 2025").
    #[must_use]
    pub fn published_label(&self) -> String {
        self.published_at
            .map(|d| d.format("%B %-d, %Y").to_string())
            .unwrap_or_default()
    }
}

/// One page of posts.
#[derive(Debug, Clone, Default)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub pagination: Pagination,
}

impl PostPage {
    /// Whether a further page exists.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.pagination.page < self.pagination.page_count
    }
}

/// A static page (terms, privacy, pharmacy information, ...).
#[derive(Debug, Clone)]
pub struct Page {
    pub id: u64,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub content_html: String,
}

impl Page {
    pub(crate) fn from_entry(entry: Entry<PageAttributes>) -> Self {
        let attrs = entry.attributes;
        Self {
            id: entry.id,
            slug: attrs.slug,
            title: attrs.title,
            description: attrs.description.filter(|d| !d.trim().is_empty()),
            updated_at: attrs.updated_at,
            content_html: render_markdown(attrs.body.as_deref().unwrap_or_default()),
        }
    }
}

/// A home page banner.
#[derive(Debug, Clone)]
pub struct Banner {
    pub id: u64,
    pub title: String,
    pub subtitle: Option<String>,
    pub link_url: Option<String>,
    pub cta_label: String,
    pub image_url: Option<String>,
    pub image_alt: String,
    pub position: i64,
}

impl Banner {
    pub(crate) fn from_entry(entry: Entry<BannerAttributes>, base_url: &str) -> Self {
        let attrs = entry.attributes;
        let (image_url, image_alt) = match attrs.image.and_then(|m| m.resolve(base_url)) {
            Some((url, alt)) => (Some(url), alt),
            None => (None, String::new()),
        };
        Self {
            id: entry.id,
            title: attrs.title,
            subtitle: attrs.subtitle.filter(|s| !s.trim().is_empty()),
            link_url: attrs.link_url.filter(|s| !s.trim().is_empty()),
            cta_label: attrs
                .cta_label
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "Shop now".to_string()),
            image_url,
            image_alt,
            position: attrs.position,
        }
    }
}
