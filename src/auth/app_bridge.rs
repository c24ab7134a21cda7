//! Responses that hand control back to App Bridge.
//!
//! An embedded app runs inside an iframe in the Shopify admin, so it cannot
//! redirect the merchant to the OAuth consent screen with a plain `302`:
//! the consent screen refuses to render in a frame. Instead the app answers
//! with a `401` carrying [`REAUTH_URL_HEADER`]. App Bridge intercepts that
//! response and navigates the top-level window to the URL in the header.
//!
//! ```rust
//! use shopify_app::auth::app_bridge::{redirect_with_app_bridge_headers, REAUTH_URL_HEADER};
//! use shopify_app::{ApiKey, ApiSecretKey, AppConfig, AppUrl, ShopDomain};
//!
//! let config = AppConfig::builder()
//!     .api_key(ApiKey::new("key").unwrap())
//!     .api_secret_key(ApiSecretKey::new("secret").unwrap())
//!     .app_url(AppUrl::new("https://myapp.example.com").unwrap())
//!     .build()
//!     .unwrap();
//! let shop = ShopDomain::new("my-store").unwrap();
//!
//! let response = redirect_with_app_bridge_headers(&config, &shop);
//! assert_eq!(response.status(), 401);
//! assert_eq!(
//!     response.headers()[REAUTH_URL_HEADER],
//!     "https://myapp.example.com/auth?shop=my-store.myshopify.com"
//! );
//! ```

use crate::auth::{bearer_token, query_pairs, redirect, response, AppResponse};
use crate::config::{AppConfig, ShopDomain};
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS,
    CONTENT_TYPE,
};
use http::{HeaderValue, Request, StatusCode};

/// Header carrying the URL App Bridge should navigate the top frame to.
pub const REAUTH_URL_HEADER: &str = "X-Shopify-API-Request-Failure-Reauthorize-Url";

/// Header telling App Bridge that the request failed for lack of authorization.
pub const REAUTH_HEADER: &str = "X-Shopify-API-Request-Failure-Reauthorize";

/// Header asking App Bridge to retry the request with a fresh session token.
pub const RETRY_INVALID_SESSION_HEADER: &str = "X-Shopify-Retry-Invalid-Session-Request";

/// The App Bridge script every app page must load.
pub const APP_BRIDGE_URL: &str = "https://cdn.shopify.com/shopifycloud/app-bridge.js";

/// Query parameter the bounce page uses to know where to return to.
pub const RELOAD_PARAM: &str = "shopify-reload";

/// Returns the URL that restarts authentication for `shop`:
/// `app_url + auth_path + "?shop=" + shop`.
#[must_use]
pub fn reauth_url(config: &AppConfig, shop: &ShopDomain) -> String {
    format!(
        "{}?shop={}",
        config.app_url().join_path(config.auth_path()),
        shop.as_ref()
    )
}

/// Builds the `401 Unauthorized` response asking App Bridge to restart
/// authentication for `shop`.
#[must_use]
pub fn redirect_with_app_bridge_headers(config: &AppConfig, shop: &ShopDomain) -> AppResponse {
    app_bridge_redirect_response(config, &reauth_url(config, shop))
}

/// Builds the `401 Unauthorized` response asking App Bridge to navigate the
/// top frame to `url`.
///
/// Embedded apps are called cross-origin from the admin, so for them the
/// response also exposes the reauthorization headers to the iframe.
#[must_use]
pub fn app_bridge_redirect_response(config: &AppConfig, url: &str) -> AppResponse {
    let mut response = response(StatusCode::UNAUTHORIZED, String::new());
    let headers = response.headers_mut();

    headers.insert(REAUTH_HEADER, HeaderValue::from_static("1"));
    if let Ok(value) = HeaderValue::from_str(url) {
        headers.insert(REAUTH_URL_HEADER, value);
    }

    if config.is_embedded_app() {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Authorization"),
        );
        headers.insert(
            ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static(
                "X-Shopify-API-Request-Failure-Reauthorize, X-Shopify-API-Request-Failure-Reauthorize-Url",
            ),
        );
    }

    tracing::debug!(url, "Requesting App Bridge redirect");
    response
}

/// Sends the merchant to `url` from wherever the request came from.
///
/// - fetch requests (with a bearer token) get the `401` App Bridge response
/// - embedded document requests go through the exit-iframe page
/// - everything else gets a plain `302`
pub fn redirect_out_of_app<B>(
    config: &AppConfig,
    request: &Request<B>,
    shop: &ShopDomain,
    url: &str,
) -> AppResponse {
    if bearer_token(request.headers()).is_some() {
        return app_bridge_redirect_response(config, url);
    }

    let params = query_pairs(request.uri());
    let embedded = params.iter().any(|(k, v)| k == "embedded" && v == "1");
    if config.is_embedded_app() && embedded {
        let mut query = vec![format!("shop={}", urlencoding::encode(shop.as_ref()))];
        if let Some((_, host)) = params.iter().find(|(k, _)| k == "host") {
            query.push(format!("host={}", urlencoding::encode(host)));
        }
        query.push(format!("exitIframe={}", urlencoding::encode(url)));

        return redirect(&format!("{}?{}", config.exit_iframe_path(), query.join("&")));
    }

    redirect(url)
}

/// Tells App Bridge that the session token was rejected.
///
/// Fetch requests get a `401` with [`RETRY_INVALID_SESSION_HEADER`] so App
/// Bridge retries with a fresh token. Document requests are sent to the
/// bounce page, which loads App Bridge and returns with a new `id_token`.
pub fn respond_to_invalid_session_token<B>(config: &AppConfig, request: &Request<B>) -> AppResponse {
    if bearer_token(request.headers()).is_some() {
        let mut response = response(StatusCode::UNAUTHORIZED, String::new());
        let headers = response.headers_mut();
        headers.insert(RETRY_INVALID_SESSION_HEADER, HeaderValue::from_static("1"));
        if config.is_embedded_app() {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
            headers.insert(
                ACCESS_CONTROL_EXPOSE_HEADERS,
                HeaderValue::from_static(RETRY_INVALID_SESSION_HEADER),
            );
        }
        return response;
    }

    redirect_to_bounce_page(config, request)
}

/// Redirects a document request to the session-token bounce page.
pub fn redirect_to_bounce_page<B>(config: &AppConfig, request: &Request<B>) -> AppResponse {
    let params: Vec<(String, String)> = query_pairs(request.uri())
        .into_iter()
        .filter(|(key, _)| key != "id_token")
        .collect();

    let reload_query = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let reload_path = if reload_query.is_empty() {
        request.uri().path().to_string()
    } else {
        format!("{}?{reload_query}", request.uri().path())
    };

    let mut query = reload_query;
    if !query.is_empty() {
        query.push('&');
    }
    query.push_str(&format!("{RELOAD_PARAM}={}", urlencoding::encode(&reload_path)));

    redirect(&format!("{}?{query}", config.session_token_path()))
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn html_response(body: String) -> AppResponse {
    let mut response = response(StatusCode::OK, body);
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html;charset=utf-8"),
    );
    response
}

fn app_bridge_script(config: &AppConfig) -> String {
    format!(
        r#"<script data-api-key="{}" src="{APP_BRIDGE_URL}"></script>"#,
        escape_html(config.api_key().as_ref())
    )
}

/// Renders the bounce page: App Bridge loads, fetches a session token and
/// reloads the URL in [`RELOAD_PARAM`] with it.
#[must_use]
pub fn bounce_page(config: &AppConfig) -> AppResponse {
    html_response(app_bridge_script(config))
}

/// Renders the page that opens `destination` in the top frame.
#[must_use]
pub fn exit_iframe_page(config: &AppConfig, destination: &str) -> AppResponse {
    let destination = serde_json::to_string(destination)
        .unwrap_or_default()
        .replace('<', "\\u003c");
    html_response(format!(
        "{}\n<script>window.open({destination}, \"_top\")</script>",
        app_bridge_script(config)
    ))
}

/// Returns `true` if `destination` is safe to open from the exit-iframe
/// page: a path on the app, a URL on the app's host, or a Shopify admin URL.
#[must_use]
pub fn is_allowed_exit_destination(config: &AppConfig, destination: &str) -> bool {
    if destination.starts_with('/') {
        // Browsers read `\` as `/`, so `/\host` would leave the app.
        if destination.contains('\\') || destination.chars().any(char::is_control) {
            return false;
        }
        let Ok(base) = url::Url::parse(config.app_url().as_ref()) else {
            return false;
        };
        return base
            .join(destination)
            .is_ok_and(|resolved| resolved.origin() == base.origin());
    }

    let Ok(url) = url::Url::parse(destination) else {
        return false;
    };
    if url.scheme() != "https" && url.scheme() != config.app_url().scheme() {
        return false;
    }

    match url.host_str() {
        Some(host) => {
            Some(host) == config.app_url().host_name()
                || host == "admin.shopify.com"
                || host.ends_with(".myshopify.com")
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiKey, ApiSecretKey, AppUrl};
    use http::header::{AUTHORIZATION, LOCATION};

    fn config(embedded: bool) -> AppConfig {
        AppConfig::builder()
            .api_key(ApiKey::new("test-api-key").unwrap())
            .api_secret_key(ApiSecretKey::new("test-secret").unwrap())
            .app_url(AppUrl::new("https://myapp.example.com").unwrap())
            .is_embedded_app(embedded)
            .build()
            .unwrap()
    }

    fn shop() -> ShopDomain {
        ShopDomain::new("test-shop").unwrap()
    }

    #[test]
    fn test_reauth_url_uses_custom_auth_path() {
        let config = AppConfig::builder()
            .api_key(ApiKey::new("k").unwrap())
            .api_secret_key(ApiSecretKey::new("s").unwrap())
            .app_url(AppUrl::new("https://myapp.example.com/").unwrap())
            .auth_path_prefix("/api/auth")
            .build()
            .unwrap();

        assert_eq!(
            reauth_url(&config, &shop()),
            "https://myapp.example.com/api/auth?shop=test-shop.myshopify.com"
        );
    }

    #[test]
    fn test_reauth_url_for_every_shop_form_and_prefix() {
        let shops = [
            ("test-shop", "test-shop.myshopify.com"),
            ("Test-Shop.myshopify.com", "test-shop.myshopify.com"),
            ("https://shop-2.myshopify.com/", "shop-2.myshopify.com"),
            ("admin.shopify.com/store/acme-store", "acme-store.myshopify.com"),
            ("https://admin.shopify.com/store/acme-store/apps/x", "acme-store.myshopify.com"),
        ];
        let prefixes = ["/auth", "/api/auth", "/shopify/oauth"];
        let app_urls = ["https://myapp.example.com", "http://localhost:3000/"];

        for app_url in app_urls {
            for prefix in prefixes {
                let config = AppConfig::builder()
                    .api_key(ApiKey::new("k").unwrap())
                    .api_secret_key(ApiSecretKey::new("s").unwrap())
                    .app_url(AppUrl::new(app_url).unwrap())
                    .auth_path_prefix(prefix)
                    .build()
                    .unwrap();

                for (raw, domain) in shops {
                    let shop = ShopDomain::new(raw).unwrap();
                    let expected = format!(
                        "{}{prefix}?shop={domain}",
                        app_url.trim_end_matches('/')
                    );

                    assert_eq!(reauth_url(&config, &shop), expected);
                    let response = redirect_with_app_bridge_headers(&config, &shop);
                    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
                    assert_eq!(response.headers()[REAUTH_URL_HEADER], expected.as_str());
                }
            }
        }
    }

    #[test]
    fn test_embedded_response_exposes_reauth_headers() {
        let response = redirect_with_app_bridge_headers(&config(true), &shop());

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[REAUTH_HEADER], "1");
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(response.headers()[ACCESS_CONTROL_EXPOSE_HEADERS]
            .to_str()
            .unwrap()
            .contains(REAUTH_URL_HEADER));
    }

    #[test]
    fn test_standalone_response_has_no_cors_headers() {
        let response = redirect_with_app_bridge_headers(&config(false), &shop());

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(REAUTH_URL_HEADER));
        assert!(!response.headers().contains_key(ACCESS_CONTROL_ALLOW_ORIGIN));
        assert!(!response.headers().contains_key(ACCESS_CONTROL_EXPOSE_HEADERS));
    }

    #[test]
    fn test_redirect_out_of_app_for_fetch_request() {
        let request = Request::get("/api/data")
            .header(AUTHORIZATION, "Bearer token")
            .body(())
            .unwrap();

        let response = redirect_out_of_app(&config(true), &request, &shop(), "https://x.example.com");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[REAUTH_URL_HEADER], "https://x.example.com");
    }

    #[test]
    fn test_redirect_out_of_app_for_embedded_document() {
        let request = Request::get("/app?embedded=1&host=aG9zdA&shop=test-shop.myshopify.com")
            .body(())
            .unwrap();

        let response = redirect_out_of_app(&config(true), &request, &shop(), "/auth?shop=x");

        let location = response.headers()[LOCATION].to_str().unwrap();
        assert!(location.starts_with("/auth/exit-iframe?shop=test-shop.myshopify.com&host=aG9zdA"));
        assert!(location.ends_with(&format!("exitIframe={}", urlencoding::encode("/auth?shop=x"))));
    }

    #[test]
    fn test_invalid_session_token_fetch_request_asks_for_retry() {
        let request = Request::get("/api/data")
            .header(AUTHORIZATION, "Bearer expired")
            .body(())
            .unwrap();

        let response = respond_to_invalid_session_token(&config(true), &request);

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[RETRY_INVALID_SESSION_HEADER], "1");
    }

    #[test]
    fn test_invalid_session_token_document_request_bounces() {
        let request = Request::get("/app?shop=test-shop.myshopify.com&id_token=expired")
            .body(())
            .unwrap();

        let response = respond_to_invalid_session_token(&config(true), &request);
        let location = response.headers()[LOCATION].to_str().unwrap();

        assert!(location.starts_with("/auth/session-token?shop=test-shop.myshopify.com&"));
        assert!(!location.contains("id_token"));
        assert!(location.contains(&format!(
            "shopify-reload={}",
            urlencoding::encode("/app?shop=test-shop.myshopify.com")
        )));
    }

    #[test]
    fn test_exit_iframe_page_escapes_destination() {
        let response = exit_iframe_page(&config(true), "/app</script>");
        let body = response.body();

        assert!(body.contains(APP_BRIDGE_URL));
        assert!(body.contains(r#"data-api-key="test-api-key""#));
        assert!(!body.contains("</script>\", \"_top\""));
        assert!(body.contains("window.open(\"/app\\u003c/script>\", \"_top\")"));
    }

    #[test]
    fn test_exit_destination_validation() {
        let config = config(true);

        assert!(is_allowed_exit_destination(&config, "/auth?shop=x"));
        assert!(is_allowed_exit_destination(&config, "https://myapp.example.com/auth"));
        assert!(is_allowed_exit_destination(
            &config,
            "https://admin.shopify.com/store/x/apps/key"
        ));
        assert!(!is_allowed_exit_destination(&config, "//evil.example.com"));
        assert!(!is_allowed_exit_destination(&config, "/\\evil.example.com"));
        assert!(!is_allowed_exit_destination(&config, "/\\/evil.example.com"));
        assert!(!is_allowed_exit_destination(&config, "/\t/evil.example.com"));
        assert!(!is_allowed_exit_destination(&config, "https://evil.example.com"));
        assert!(!is_allowed_exit_destination(&config, "javascript:alert(1)"));
    }
}
