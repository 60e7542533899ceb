//! Security headers middleware for XSS, clickjacking, and isolation protection.
//!
//! Adds restrictive security headers to all responses. Start locked down and
//! loosen only when specific functionality requires it.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{
        HeaderName, HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};
use url::Url;

use super::CspNonce;
use crate::config::StorefrontConfig;

/// Origins product and editorial images are served from.
///
/// Rendered into the `img-src` directive, space separated.
#[derive(Debug, Clone, Default)]
pub struct ImageHosts(Arc<str>);

impl ImageHosts {
    /// Collect the commerce and content API origins.
    #[must_use]
    pub fn from_config(config: &StorefrontConfig) -> Self {
        let mut origins: Vec<String> = Vec::new();
        let bases = std::iter::once(config.commerce.base_url.as_str())
            .chain(config.content.as_ref().map(|c| c.base_url.as_str()));
        for base in bases {
            if let Some(origin) = origin_of(base)
                && !origins.contains(&origin)
            {
                origins.push(origin);
            }
        }
        Self(Arc::from(origins.join(" ")))
    }

    /// The space-separated origin list.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn origin_of(base: &str) -> Option<String> {
    let url = Url::parse(base).ok()?;
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

/// Build the CSP for one response.
///
/// ```text
/// default-src 'none';
/// script-src 'self' 'nonce-<nonce>';
/// style-src 'self';
/// font-src 'self';
/// img-src 'self' data: <commerce origin> <content origin>;
/// connect-src 'self';
/// frame-src 'none';
/// object-src 'none';
/// base-uri 'self';
/// form-action 'self' <commerce origin>;
/// frame-ancestors 'none';
/// upgrade-insecure-requests
/// ```
fn content_security_policy(nonce: &str, hosts: &ImageHosts) -> String {
    let script_src = if nonce.is_empty() {
        "'self'".to_string()
    } else {
        format!("'self' 'nonce-{nonce}'")
    };
    let hosts = hosts.as_str();

    format!(
        "default-src 'none'; \
         script-src {script_src}; \
         style-src 'self'; \
         font-src 'self'; \
         img-src 'self' data: {hosts}; \
         connect-src 'self'; \
         frame-src 'none'; \
         object-src 'none'; \
         base-uri 'self'; \
         form-action 'self' {hosts}; \
         frame-ancestors 'none'; \
         upgrade-insecure-requests"
    )
}

/// Add security headers to all responses.
///
/// Headers applied:
/// - `X-Frame-Options: DENY` - Prevent clickjacking
/// - `X-Content-Type-Options: nosniff` - Prevent MIME sniffing
/// - `Referrer-Policy: no-referrer` - Zero referrer leakage
/// - `Content-Security-Policy` - Strict CSP with the request's nonce
/// - `Permissions-Policy` - Deny all sensitive features
/// - `Cache-Control: no-store, max-age=0` - Unless the handler set one
/// - `Cross-Origin-Opener-Policy: same-origin` - Process isolation
/// - `Cross-Origin-Resource-Policy: same-origin` - Resource isolation
/// - `Cross-Origin-Embedder-Policy: credentialless` - Allows upstream images
/// - `X-DNS-Prefetch-Control: off` - Prevent DNS prefetch leakage
///
/// Must run inside `csp_nonce_middleware` so the nonce is available.
pub async fn security_headers_middleware(
    State(hosts): State<ImageHosts>,
    request: Request,
    next: Next,
) -> Response {
    let nonce = request
        .extensions()
        .get::<CspNonce>()
        .map(|n| n.value().to_string())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(REFERRER_POLICY, HeaderValue::from_static("no-referrer"));

    match HeaderValue::from_str(&content_security_policy(&nonce, &hosts)) {
        Ok(value) => {
            headers.insert(CONTENT_SECURITY_POLICY, value);
        }
        Err(e) => {
            tracing::error!(error = %e, "Invalid CSP header, falling back to strict policy");
            headers.insert(
                CONTENT_SECURITY_POLICY,
                HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
            );
        }
    }

    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(
            "accelerometer=(), \
             autoplay=(), \
             browsing-topics=(), \
             camera=(), \
             display-capture=(), \
             encrypted-media=(), \
             fullscreen=(), \
             geolocation=(), \
             gyroscope=(), \
             hid=(), \
             idle-detection=(), \
             interest-cohort=(), \
             magnetometer=(), \
             microphone=(), \
             midi=(), \
             payment=(), \
             picture-in-picture=(), \
             publickey-credentials-get=(), \
             screen-wake-lock=(), \
             serial=(), \
             usb=(), \
             xr-spatial-tracking=()",
        ),
    );

    // Session-bound pages (cart, reminders) must never be cached by proxies
    headers
        .entry(CACHE_CONTROL)
        .or_insert(HeaderValue::from_static("no-store, max-age=0"));

    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-embedder-policy"),
        HeaderValue::from_static("credentialless"),
    );
    headers.insert(
        HeaderName::from_static("x-dns-prefetch-control"),
        HeaderValue::from_static("off"),
    );

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{ContentConfig, tests::test_config};
    use secrecy::SecretString;
    use std::time::Duration;

    #[test]
    fn test_image_hosts_from_config() {
        let mut config = test_config();
        config.commerce.base_url = "https://shop.apoteka.test/store".to_string();
        config.content = Some(ContentConfig {
            base_url: "https://cms.apoteka.test".to_string(),
            api_token: SecretString::from("token"),
            cache_ttl: Duration::from_secs(60),
        });

        let hosts = ImageHosts::from_config(&config);
        assert_eq!(hosts.as_str(), "https://shop.apoteka.test https://cms.apoteka.test");
    }

    #[test]
    fn test_image_hosts_dedupes_same_origin() {
        let mut config = test_config();
        config.commerce.base_url = "https://apoteka.test/shop".to_string();
        config.content = Some(ContentConfig {
            base_url: "https://apoteka.test/cms".to_string(),
            api_token: SecretString::from("token"),
            cache_ttl: Duration::from_secs(60),
        });
        assert_eq!(ImageHosts::from_config(&config).as_str(), "https://apoteka.test");
    }

    #[test]
    fn test_csp_includes_nonce_and_hosts() {
        let hosts = ImageHosts(Arc::from("https://shop.apoteka.test"));
        let csp = content_security_policy("abc123", &hosts);
        assert!(csp.contains("script-src 'self' 'nonce-abc123';"));
        assert!(csp.contains("img-src 'self' data: https://shop.apoteka.test;"));
        assert!(csp.contains("frame-ancestors 'none'"));
    }

    #[test]
    fn test_csp_without_nonce() {
        let csp = content_security_policy("", &ImageHosts::default());
        assert!(csp.contains("script-src 'self';"));
        assert!(HeaderValue::from_str(&csp).is_ok());
    }
}
