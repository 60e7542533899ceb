//! `CommerceClient` implementation.

use std::sync::Arc;

use apoteka_core::{AttributeId, Email, ProductId};
use moka::future::Cache;
use reqwest::header::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::config::CommerceConfig;

use super::CommerceError;
use super::cache::{CacheValue, cache_key};
use super::types::{
    AttributeRecord, AttributeTermRecord, CategoryRecord, OrderCreated, OrderDraft, ProductPage,
    ProductQuery, ProductRecord, ProxiedResponse, TagRecord, TokenRequest, UserProfile, VariationRecord,
};

/// Page size used when walking every page of a taxonomy.
const TAXONOMY_PAGE_SIZE: u32 = 100;

/// Hard stop for taxonomy pagination.
const MAX_TAXONOMY_PAGES: u32 = 20;

/// Client for the commerce REST API.
///
/// Catalog reads (products, variations, taxonomies) are cached for the
/// configured TTL. Searches, orders and token requests always go upstream.
#[derive(Clone)]
pub struct CommerceClient {
    inner: Arc<CommerceClientInner>,
}

struct CommerceClientInner {
    client: reqwest::Client,
    /// `{base}/wp-json/wc/v3`
    api_base: String,
    /// `{base}/wp-json/jwt-auth/v1`
    auth_base: String,
    /// `{base}/wp-json/wp/v2`
    users_base: String,
    consumer_key: String,
    consumer_secret: SecretString,
    cache: Cache<String, CacheValue>,
}

impl CommerceClient {
    /// Create a new commerce API client.
    #[must_use]
    pub fn new(config: &CommerceConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.cache_ttl)
            .build();

        Self {
            inner: Arc::new(CommerceClientInner {
                client: reqwest::Client::new(),
                api_base: format!("{}/wp-json/wc/v3", config.base_url),
                auth_base: format!("{}/wp-json/jwt-auth/v1", config.base_url),
                users_base: format!("{}/wp-json/wp/v2", config.base_url),
                consumer_key: config.consumer_key.clone(),
                consumer_secret: config.consumer_secret.clone(),
                cache,
            }),
        }
    }

    /// Drop every cached response.
    pub fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
    }

    // =========================================================================
    // Transport
    // =========================================================================

    /// GET a JSON resource under the REST base, returning the response headers too.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<(T, HeaderMap), CommerceError> {
        let url = format!("{}{path}", self.inner.api_base);

        let response = self
            .inner
            .client
            .get(&url)
            .basic_auth(
                &self.inner.consumer_key,
                Some(self.inner.consumer_secret.expose_secret()),
            )
            .query(params)
            .send()
            .await?;

        let (text, headers) = Self::read_success(response, path).await?;
        let value = Self::parse(&text, path)?;
        Ok((value, headers))
    }

    /// POST a JSON body under the REST base.
    async fn post_json<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, CommerceError> {
        let url = format!("{}{path}", self.inner.api_base);

        let response = self
            .inner
            .client
            .post(&url)
            .basic_auth(
                &self.inner.consumer_key,
                Some(self.inner.consumer_secret.expose_secret()),
            )
            .json(body)
            .send()
            .await?;

        let (text, _) = Self::read_success(response, path).await?;
        Self::parse(&text, path)
    }

    /// Map non-success statuses to errors and return the body text.
    async fn read_success(
        response: reqwest::Response,
        path: &str,
    ) -> Result<(String, HeaderMap), CommerceError> {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(1);
            return Err(CommerceError::RateLimited(retry_after));
        }

        let headers = response.headers().clone();
        let text = response.text().await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CommerceError::NotFound(path.to_string()));
        }

        if !status.is_success() {
            tracing::error!(
                status = %status,
                path = %path,
                body = %text.chars().take(500).collect::<String>(),
                "Commerce API returned non-success status"
            );
            return Err(CommerceError::Api {
                status: status.as_u16(),
                message: upstream_message(&text),
            });
        }

        Ok((text, headers))
    }

    fn parse<T: DeserializeOwned>(text: &str, path: &str) -> Result<T, CommerceError> {
        serde_json::from_str(text).map_err(|e| {
            tracing::error!(
                error = %e,
                path = %path,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to parse commerce API response"
            );
            CommerceError::Parse(e)
        })
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// List products matching a query.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, query), fields(page = query.page, search = query.is_search()))]
    pub async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage, CommerceError> {
        let params = query.to_params();
        let key = cache_key("/products", &params);
        let cacheable = !query.is_search();

        if cacheable
            && let Some(CacheValue::Products(page)) = self.inner.cache.get(&key).await
        {
            debug!("Cache hit for products");
            return Ok(page);
        }

        let (products, headers): (Vec<ProductRecord>, _) =
            self.get_json("/products", &params).await?;

        let total = header_number(&headers, "X-WP-Total").unwrap_or(products.len() as u64);
        let total_pages = header_number(&headers, "X-WP-TotalPages")
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(1);

        let page = ProductPage {
            products,
            total,
            total_pages,
            page: query.page.max(1),
        };

        if cacheable {
            self.inner
                .cache
                .insert(key, CacheValue::Products(page.clone()))
                .await;
        }

        Ok(page)
    }

    /// Get a product by id.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the product does not exist, or an
    /// error if the API request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<ProductRecord, CommerceError> {
        let path = format!("/products/{id}");

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&path).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let (product, _): (ProductRecord, _) = self.get_json(&path, &[]).await?;

        self.inner
            .cache
            .insert(path, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// Get a published product by slug.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if no published product has this
    /// slug, or an error if the API request fails.
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn get_product_by_slug(&self, slug: &str) -> Result<ProductRecord, CommerceError> {
        let params = [
            ("slug", slug.to_string()),
            ("status", "publish".to_string()),
        ];
        let key = cache_key("/products", &params);

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let (products, _): (Vec<ProductRecord>, _) = self.get_json("/products", &params).await?;

        let product = products
            .into_iter()
            .next()
            .ok_or_else(|| CommerceError::NotFound(format!("Product not found: {slug}")))?;

        self.inner
            .cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// List the variations of a variable product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn list_variations(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<VariationRecord>, CommerceError> {
        let path = format!("/products/{product_id}/variations");
        let params = [("per_page", ProductQuery::MAX_PER_PAGE.to_string())];
        let key = cache_key(&path, &params);

        if let Some(CacheValue::Variations(variations)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for variations");
            return Ok(variations);
        }

        let (variations, _): (Vec<VariationRecord>, _) = self.get_json(&path, &params).await?;

        self.inner
            .cache
            .insert(key, CacheValue::Variations(variations.clone()))
            .await;

        Ok(variations)
    }

    // =========================================================================
    // Taxonomies
    // =========================================================================

    /// Walk every page of a taxonomy endpoint.
    async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, String)],
    ) -> Result<Vec<T>, CommerceError> {
        let mut all = Vec::new();
        let mut page = 1;

        loop {
            let mut params = vec![
                ("per_page", TAXONOMY_PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ];
            params.extend(extra.iter().cloned());

            let (batch, headers): (Vec<T>, _) = self.get_json(path, &params).await?;
            let batch_len = batch.len();
            all.extend(batch);

            let total_pages = header_number(&headers, "X-WP-TotalPages").unwrap_or(1);
            if u64::from(page) >= total_pages
                || batch_len < TAXONOMY_PAGE_SIZE as usize
                || page >= MAX_TAXONOMY_PAGES
            {
                break;
            }
            page += 1;
        }

        Ok(all)
    }

    /// List all non-empty product categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<CategoryRecord>, CommerceError> {
        let extra = [("hide_empty", "true".to_string())];
        let key = cache_key("/products/categories", &extra);

        if let Some(CacheValue::Categories(categories)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories: Vec<CategoryRecord> =
            self.list_all("/products/categories", &extra).await?;

        self.inner
            .cache
            .insert(key, CacheValue::Categories(categories.clone()))
            .await;

        Ok(categories)
    }

    /// Find a category by slug.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if no category has this slug, or an
    /// error if the API request fails.
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn get_category_by_slug(&self, slug: &str) -> Result<CategoryRecord, CommerceError> {
        self.list_categories()
            .await?
            .into_iter()
            .find(|c| c.slug == slug)
            .ok_or_else(|| CommerceError::NotFound(format!("Category not found: {slug}")))
    }

    /// List all product tags.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_tags(&self) -> Result<Vec<TagRecord>, CommerceError> {
        let key = "/products/tags".to_string();

        if let Some(CacheValue::Tags(tags)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for tags");
            return Ok(tags);
        }

        let tags: Vec<TagRecord> = self.list_all("/products/tags", &[]).await?;

        self.inner
            .cache
            .insert(key, CacheValue::Tags(tags.clone()))
            .await;

        Ok(tags)
    }

    /// Find a tag by slug.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if no tag has this slug, or an error
    /// if the API request fails.
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn get_tag_by_slug(&self, slug: &str) -> Result<TagRecord, CommerceError> {
        self.list_tags()
            .await?
            .into_iter()
            .find(|t| t.slug == slug)
            .ok_or_else(|| CommerceError::NotFound(format!("Tag not found: {slug}")))
    }

    /// List the global product attributes.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_attributes(&self) -> Result<Vec<AttributeRecord>, CommerceError> {
        let key = "/products/attributes".to_string();

        if let Some(CacheValue::Attributes(attributes)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for attributes");
            return Ok(attributes);
        }

        let (attributes, _): (Vec<AttributeRecord>, _) =
            self.get_json("/products/attributes", &[]).await?;

        self.inner
            .cache
            .insert(key, CacheValue::Attributes(attributes.clone()))
            .await;

        Ok(attributes)
    }

    /// List the terms of a global attribute.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(attribute_id = %attribute_id))]
    pub async fn list_attribute_terms(
        &self,
        attribute_id: AttributeId,
    ) -> Result<Vec<AttributeTermRecord>, CommerceError> {
        let path = format!("/products/attributes/{attribute_id}/terms");

        if let Some(CacheValue::AttributeTerms(terms)) = self.inner.cache.get(&path).await {
            debug!("Cache hit for attribute terms");
            return Ok(terms);
        }

        let terms: Vec<AttributeTermRecord> = self.list_all(&path, &[]).await?;

        self.inner
            .cache
            .insert(path, CacheValue::AttributeTerms(terms.clone()))
            .await;

        Ok(terms)
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Create an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the order or the request fails.
    #[instrument(skip(self, draft), fields(lines = draft.line_items.len()))]
    pub async fn create_order(&self, draft: &OrderDraft) -> Result<OrderCreated, CommerceError> {
        let order: OrderCreated = self.post_json("/orders", draft).await?;
        tracing::info!(order_id = %order.id, "Order created");
        Ok(order)
    }

    // =========================================================================
    // Token proxy
    // =========================================================================

    /// Exchange customer credentials for a token.
    ///
    /// The upstream status and body are returned as-is so the caller can relay
    /// them; only transport failures are errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or the body cannot be read.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn request_token(
        &self,
        request: &TokenRequest,
    ) -> Result<ProxiedResponse, CommerceError> {
        let response = self
            .inner
            .client
            .post(format!("{}/token", self.inner.auth_base))
            .json(request)
            .send()
            .await?;

        Self::relay(response).await
    }

    /// Ask the auth endpoint whether a token is still valid.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or the body cannot be read.
    #[instrument(skip(self, token))]
    pub async fn validate_token(&self, token: &str) -> Result<ProxiedResponse, CommerceError> {
        let response = self
            .inner
            .client
            .post(format!("{}/token/validate", self.inner.auth_base))
            .bearer_auth(token)
            .send()
            .await?;

        Self::relay(response).await
    }

    /// Email of the customer a token belongs to.
    ///
    /// The token is checked against the validate endpoint first, then the
    /// profile is read with it. `None` means the token is not valid or the
    /// profile carries no usable email.
    ///
    /// # Errors
    ///
    /// Returns an error if either request cannot be sent or the profile
    /// cannot be parsed.
    #[instrument(skip(self, token))]
    pub async fn token_email(&self, token: &str) -> Result<Option<Email>, CommerceError> {
        let validation = self.validate_token(token).await?;
        if !validation.is_success() {
            debug!(status = validation.status, "Token rejected by auth endpoint");
            return Ok(None);
        }

        let response = self
            .inner
            .client
            .get(format!("{}/users/me", self.inner.users_base))
            .query(&[("context", "edit")])
            .bearer_auth(token)
            .send()
            .await?;
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Validated token has no readable profile");
            return Ok(None);
        }

        let text = response.text().await?;
        let profile: UserProfile = serde_json::from_str(&text)?;
        Ok(Email::parse(&profile.email).ok())
    }

    async fn relay(response: reqwest::Response) -> Result<ProxiedResponse, CommerceError> {
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = serde_json::from_str(&text)
            .unwrap_or_else(|_| serde_json::json!({ "message": upstream_message(&text) }));
        Ok(ProxiedResponse { status, body })
    }
}

/// Read a numeric pagination header.
fn header_number(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

/// Pull a human-readable message out of an upstream error body.
///
/// The API answers errors with `{ "code", "message", "data" }`; anything
/// else is truncated and passed through.
fn upstream_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_header_number() {
        let mut headers = HeaderMap::new();
        headers.insert("X-WP-Total", HeaderValue::from_static("42"));
        headers.insert("X-WP-TotalPages", HeaderValue::from_static(" 4 "));

        assert_eq!(header_number(&headers, "X-WP-Total"), Some(42));
        assert_eq!(header_number(&headers, "X-WP-TotalPages"), Some(4));
        assert_eq!(header_number(&headers, "X-Missing"), None);
    }

    #[test]
    fn test_upstream_message_prefers_json_message() {
        let body = r#"{"code":"woocommerce_rest_invalid_id","message":"Invalid ID.","data":{"status":404}}"#;
        assert_eq!(upstream_message(body), "Invalid ID.");
        assert_eq!(upstream_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_client_endpoints() {
        let config = crate::config::tests::test_config();
        let client = CommerceClient::new(&config.commerce);
        assert_eq!(client.inner.api_base, "http://127.0.0.1:9/wp-json/wc/v3");
        assert_eq!(client.inner.auth_base, "http://127.0.0.1:9/wp-json/jwt-auth/v1");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_http_error() {
        let config = crate::config::tests::test_config();
        let client = CommerceClient::new(&config.commerce);
        let result = client.get_product(ProductId::new(1)).await;
        assert!(matches!(result, Err(CommerceError::Http(_))));
    }
}
