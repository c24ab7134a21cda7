//! Response headers for app documents and cross-origin requests.

use crate::auth::app_bridge::{REAUTH_HEADER, REAUTH_URL_HEADER, RETRY_INVALID_SESSION_HEADER};
use crate::config::{AppConfig, ShopDomain};
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE, CONTENT_SECURITY_POLICY, LINK,
};
use http::{HeaderMap, HeaderValue};

const CDN_PRECONNECT: &str = r#"<https://cdn.shopify.com/>; rel="preconnect""#;

/// Adds the headers every HTML document served by the app needs.
///
/// - `Link: <https://cdn.shopify.com/>; rel="preconnect"` when the shop is known
/// - `Content-Security-Policy: frame-ancestors https://{shop} https://admin.shopify.com;`
///   for embedded apps, so only the shop's admin can frame the app
/// - `Content-Security-Policy: frame-ancestors 'none';` for standalone apps
///
/// ```rust
/// use http::HeaderMap;
/// use shopify_app::{add_document_response_headers, ApiKey, ApiSecretKey, AppConfig, AppUrl, ShopDomain};
///
/// let config = AppConfig::builder()
///     .api_key(ApiKey::new("key").unwrap())
///     .api_secret_key(ApiSecretKey::new("secret").unwrap())
///     .app_url(AppUrl::new("https://myapp.example.com").unwrap())
///     .build()
///     .unwrap();
/// let shop = ShopDomain::new("my-store").unwrap();
///
/// let mut headers = HeaderMap::new();
/// add_document_response_headers(&config, &mut headers, Some(&shop));
/// assert_eq!(
///     headers["content-security-policy"],
///     "frame-ancestors https://my-store.myshopify.com https://admin.shopify.com;"
/// );
/// ```
pub fn add_document_response_headers(
    config: &AppConfig,
    headers: &mut HeaderMap,
    shop: Option<&ShopDomain>,
) {
    if shop.is_some() {
        headers.append(LINK, HeaderValue::from_static(CDN_PRECONNECT));
    }

    let policy = match (config.is_embedded_app(), shop) {
        (true, Some(shop)) => {
            format!("frame-ancestors https://{} https://admin.shopify.com;", shop.as_ref())
        }
        (true, None) => "frame-ancestors https://admin.shopify.com;".to_string(),
        (false, _) => "frame-ancestors 'none';".to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&policy) {
        headers.insert(CONTENT_SECURITY_POLICY, value);
    }
}

/// Adds the CORS headers needed by `fetch` calls from the embedded app,
/// exposing the App Bridge reauthorization headers.
pub fn add_cors_headers(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Authorization, Content-Type"),
    );
    let exposed = format!("{REAUTH_HEADER}, {REAUTH_URL_HEADER}, {RETRY_INVALID_SESSION_HEADER}");
    if let Ok(value) = HeaderValue::from_str(&exposed) {
        headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, value);
    }
}

/// Adds the CORS headers answering a checkout extension request or its
/// preflight.
pub fn add_checkout_cors_headers(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Authorization, Content-Type"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("7200"));
}
