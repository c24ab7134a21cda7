//! Webhook signature verification.
//!
//! Shopify signs each delivery with a base64 HMAC-SHA256 of the raw body in
//! `X-Shopify-Hmac-SHA256`. [`verify_webhook`] checks it against the current
//! secret and then the old one, and parses the remaining headers.
//!
//! ```rust
//! use http::HeaderMap;
//! use shopify_app::auth::hmac::compute_signature_base64;
//! use shopify_app::webhooks::{verify_webhook, WebhookTopic, HEADER_HMAC, HEADER_SHOP_DOMAIN, HEADER_TOPIC};
//! use shopify_app::{ApiKey, ApiSecretKey, AppConfig, AppUrl};
//!
//! let config = AppConfig::builder()
//!     .api_key(ApiKey::new("key").unwrap())
//!     .api_secret_key(ApiSecretKey::new("secret").unwrap())
//!     .app_url(AppUrl::new("https://myapp.example.com").unwrap())
//!     .build()
//!     .unwrap();
//!
//! let body = br#"{"id":1}"#;
//! let mut headers = HeaderMap::new();
//! headers.insert(HEADER_HMAC, compute_signature_base64(body, "secret").parse().unwrap());
//! headers.insert(HEADER_TOPIC, "orders/create".parse().unwrap());
//! headers.insert(HEADER_SHOP_DOMAIN, "example.myshopify.com".parse().unwrap());
//!
//! let webhook = verify_webhook(&config, &headers, body).unwrap();
//! assert_eq!(webhook.topic, WebhookTopic::OrdersCreate);
//! assert_eq!(webhook.shop.as_ref(), "example.myshopify.com");
//! ```

use crate::auth::hmac::verify_base64;
use crate::config::{AppConfig, ShopDomain};
use crate::webhooks::{WebhookError, WebhookTopic};
use http::HeaderMap;

/// Base64 HMAC-SHA256 of the request body.
pub const HEADER_HMAC: &str = "X-Shopify-Hmac-SHA256";

/// Topic of the delivery, e.g. `orders/create`.
pub const HEADER_TOPIC: &str = "X-Shopify-Topic";

/// The shop's `myshopify.com` domain.
pub const HEADER_SHOP_DOMAIN: &str = "X-Shopify-Shop-Domain";

/// API version of the payload.
pub const HEADER_API_VERSION: &str = "X-Shopify-API-Version";

/// Unique id of the delivery.
pub const HEADER_WEBHOOK_ID: &str = "X-Shopify-Webhook-Id";

/// Headers of a delivery whose signature has been checked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedWebhook {
    /// Shop that triggered the delivery.
    pub shop: ShopDomain,
    /// Topic of the delivery.
    pub topic: WebhookTopic,
    /// Payload API version, empty if the header is absent.
    pub api_version: String,
    /// Delivery id, empty if the header is absent.
    pub webhook_id: String,
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn required<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, WebhookError> {
    header(headers, name).ok_or(WebhookError::MissingHeader { header: name })
}

/// Verifies a webhook delivery and parses its headers.
///
/// # Errors
///
/// - [`WebhookError::MissingHeader`] if the HMAC, topic or shop header is absent
/// - [`WebhookError::InvalidHeader`] if the shop header is not a shop domain
/// - [`WebhookError::InvalidHmac`] if the signature matches no secret
pub fn verify_webhook(
    config: &AppConfig,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<VerifiedWebhook, WebhookError> {
    let hmac = required(headers, HEADER_HMAC)?;
    let topic = required(headers, HEADER_TOPIC)?;
    let shop = required(headers, HEADER_SHOP_DOMAIN)?;

    let shop = ShopDomain::new(shop).map_err(|_| WebhookError::InvalidHeader {
        header: HEADER_SHOP_DOMAIN,
    })?;

    if !verify_base64(body, hmac, config.secrets()) {
        return Err(WebhookError::InvalidHmac);
    }

    let topic: WebhookTopic = topic.parse().unwrap_or_else(|never| match never {});

    Ok(VerifiedWebhook {
        shop,
        topic,
        api_version: header(headers, HEADER_API_VERSION)
            .unwrap_or_default()
            .to_string(),
        webhook_id: header(headers, HEADER_WEBHOOK_ID)
            .unwrap_or_default()
            .to_string(),
    })
}
