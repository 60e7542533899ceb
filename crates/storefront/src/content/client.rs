//! `ContentClient` implementation.

use std::sync::Arc;

use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::config::ContentConfig;

use super::ContentError;
use super::types::{
    Banner, BannerAttributes, Collection, Page, PageAttributes, Post, PostAttributes, PostPage,
};

/// Largest page size the CMS accepts.
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
enum CacheValue {
    Posts(PostPage),
    Post(Box<Post>),
    Page(Box<Page>),
    Banners(Vec<Banner>),
}

/// Client for the content API.
///
/// Rendered posts, pages and banners are cached with the configured TTL.
#[derive(Clone)]
pub struct ContentClient {
    inner: Arc<ContentClientInner>,
}

struct ContentClientInner {
    client: reqwest::Client,
    base_url: String,
    api_token: SecretString,
    cache: Cache<String, CacheValue>,
}

impl ContentClient {
    /// Create a new content API client.
    #[must_use]
    pub fn new(config: &ContentConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(500)
            .time_to_live(config.cache_ttl)
            .build();

        Self {
            inner: Arc::new(ContentClientInner {
                client: reqwest::Client::new(),
                base_url: config.base_url.clone(),
                api_token: config.api_token.clone(),
                cache,
            }),
        }
    }

    /// Drop every cached entry.
    pub fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
    }

    async fn get_collection<T: DeserializeOwned>(
        &self,
        collection: &str,
        params: &[(&str, String)],
    ) -> Result<Collection<T>, ContentError> {
        let url = format!("{}/api/{collection}", self.inner.base_url);

        let response = self
            .inner
            .client
            .get(&url)
            .bearer_auth(self.inner.api_token.expose_secret())
            .query(params)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                collection = %collection,
                body = %text.chars().take(500).collect::<String>(),
                "Content API returned non-success status"
            );
            return Err(ContentError::Api {
                status: status.as_u16(),
                message: text.chars().take(200).collect(),
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                collection = %collection,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to parse content API response"
            );
            ContentError::Parse(e)
        })
    }

    /// List published posts, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_posts(&self, page: u32, page_size: u32) -> Result<PostPage, ContentError> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let key = format!("posts:{page}:{page_size}");

        if let Some(CacheValue::Posts(posts)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for posts");
            return Ok(posts);
        }

        let params = [
            ("sort", "publishedAt:desc".to_string()),
            ("populate", "cover".to_string()),
            ("pagination[page]", page.to_string()),
            ("pagination[pageSize]", page_size.to_string()),
        ];
        let response: Collection<PostAttributes> = self.get_collection("posts", &params).await?;
        let posts = PostPage {
            posts: response
                .data
                .into_iter()
                .map(|entry| Post::from_entry(entry, &self.inner.base_url))
                .collect(),
            pagination: response.meta.pagination,
        };

        self.inner
            .cache
            .insert(key, CacheValue::Posts(posts.clone()))
            .await;

        Ok(posts)
    }

    /// Get a published post by slug.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::NotFound` if no post has this slug, or an
    /// error if the API request fails.
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn get_post(&self, slug: &str) -> Result<Post, ContentError> {
        let key = format!("post:{slug}");

        if let Some(CacheValue::Post(post)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for post");
            return Ok(*post);
        }

        let params = [
            ("filters[slug][$eq]", slug.to_string()),
            ("populate", "cover".to_string()),
        ];
        let response: Collection<PostAttributes> = self.get_collection("posts", &params).await?;
        let post = response
            .data
            .into_iter()
            .next()
            .map(|entry| Post::from_entry(entry, &self.inner.base_url))
            .ok_or_else(|| ContentError::NotFound(format!("Post not found: {slug}")))?;

        self.inner
            .cache
            .insert(key, CacheValue::Post(Box::new(post.clone())))
            .await;

        Ok(post)
    }

    /// Get a static page by slug.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::NotFound` if no page has this slug, or an
    /// error if the API request fails.
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn get_page(&self, slug: &str) -> Result<Page, ContentError> {
        let key = format!("page:{slug}");

        if let Some(CacheValue::Page(page)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for page");
            return Ok(*page);
        }

        let params = [("filters[slug][$eq]", slug.to_string())];
        let response: Collection<PageAttributes> = self.get_collection("pages", &params).await?;
        let page = response
            .data
            .into_iter()
            .next()
            .map(Page::from_entry)
            .ok_or_else(|| ContentError::NotFound(format!("Page not found: {slug}")))?;

        self.inner
            .cache
            .insert(key, CacheValue::Page(Box::new(page.clone())))
            .await;

        Ok(page)
    }

    /// List home page banners ordered by position.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_banners(&self) -> Result<Vec<Banner>, ContentError> {
        let key = "banners".to_string();

        if let Some(CacheValue::Banners(banners)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for banners");
            return Ok(banners);
        }

        let params = [
            ("sort", "position:asc".to_string()),
            ("populate", "image".to_string()),
        ];
        let response: Collection<BannerAttributes> =
            self.get_collection("banners", &params).await?;
        let mut banners: Vec<Banner> = response
            .data
            .into_iter()
            .map(|entry| Banner::from_entry(entry, &self.inner.base_url))
            .collect();
        banners.sort_by_key(|b| b.position);

        self.inner
            .cache
            .insert(key, CacheValue::Banners(banners.clone()))
            .await;

        Ok(banners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client() -> ContentClient {
        ContentClient::new(&ContentConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            api_token: SecretString::from("test-token"),
            cache_ttl: Duration::from_secs(60),
        })
    }

    #[tokio::test]
    async fn test_unreachable_cms_is_http_error() {
        let result = client().get_page("privacy").await;
        assert!(matches!(result, Err(ContentError::Http(_))));
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let client = client();
        assert!(client.list_banners().await.is_err());
        assert!(client.inner.cache.get("banners").await.is_none());
    }
}
