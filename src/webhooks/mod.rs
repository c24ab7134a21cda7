//! Webhook subscriptions and delivery verification.
//!
//! Subscriptions are declared once on the [`AppConfig`](crate::AppConfig)
//! with [`WebhookRegistrationBuilder`] and synced to a shop with
//! [`ShopifyApp::register_webhooks`](crate::ShopifyApp::register_webhooks),
//! usually from the `after_auth` hook. Incoming deliveries are checked with
//! [`verify_webhook`], or end to end with
//! [`Authenticate::webhook`](crate::Authenticate::webhook).
//!
//! ```rust
//! use shopify_app::webhooks::{WebhookRegistrationBuilder, WebhookTopic};
//! use shopify_app::{ApiKey, ApiSecretKey, AppConfig, AppUrl};
//!
//! let config = AppConfig::builder()
//!     .api_key(ApiKey::new("key").unwrap())
//!     .api_secret_key(ApiSecretKey::new("secret").unwrap())
//!     .app_url(AppUrl::new("https://myapp.example.com").unwrap())
//!     .webhook(WebhookRegistrationBuilder::http(WebhookTopic::AppUninstalled, "/webhooks").build())
//!     .webhook(
//!         WebhookRegistrationBuilder::http(WebhookTopic::ProductsUpdate, "/webhooks")
//!             .include_fields(vec!["id".to_string(), "title".to_string()])
//!             .build(),
//!     )
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.webhooks().len(), 2);
//! ```

mod errors;
mod registry;
mod topic;
mod types;
mod verification;

pub use errors::WebhookError;
pub use registry::WebhookRegistry;
pub use topic::WebhookTopic;
pub use types::{
    WebhookDelivery, WebhookRegistration, WebhookRegistrationBuilder, WebhookRegistrationResult,
};
pub use verification::{
    verify_webhook, VerifiedWebhook, HEADER_API_VERSION, HEADER_HMAC, HEADER_SHOP_DOMAIN,
    HEADER_TOPIC, HEADER_WEBHOOK_ID,
};
