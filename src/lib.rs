//! # Shopify App Rust SDK
//!
//! The app layer for Shopify apps written in Rust: request authentication,
//! per-shop session persistence and webhook subscriptions, independent of
//! any web framework.
//!
//! ## Overview
//!
//! - [`ShopifyApp`]: the entry point, built from an [`AppConfig`] and a
//!   [`SessionStorage`]
//! - [`Authenticate`]: `admin`, `public().checkout`, `public().app_proxy` and
//!   `webhook` request authentication, returning typed contexts
//! - [`auth::app_bridge`]: the `401` reauthorization responses App Bridge
//!   understands
//! - [`MemorySessionStorage`] and, with the `mongodb` feature,
//!   `MongoDbSessionStorage`
//! - [`webhooks`]: subscription registration and delivery verification
//! - [`AdminApiClient`]: GraphQL Admin API calls bound to a session
//!
//! Requests are [`http::Request`]s and responses are [`AppResponse`]s
//! (`http::Response<String>`), so the crate plugs into any framework built
//! on the `http` crate.
//!
//! ## Quick Start
//!
//! ```rust
//! use shopify_app::{ApiKey, ApiSecretKey, AppConfig, AppUrl, ShopifyApp};
//!
//! let config = AppConfig::builder()
//!     .api_key(ApiKey::new("your-api-key").unwrap())
//!     .api_secret_key(ApiSecretKey::new("your-api-secret").unwrap())
//!     .app_url(AppUrl::new("https://your-app.example.com").unwrap())
//!     .scopes("read_products,write_orders".parse().unwrap())
//!     .build()
//!     .unwrap();
//!
//! let app = ShopifyApp::new(config);
//! assert!(app.config().is_embedded_app());
//! ```
//!
//! ## Authenticating Requests
//!
//! ```rust,ignore
//! async fn products(app: &ShopifyApp, request: http::Request<Vec<u8>>) -> AppResponse {
//!     let ctx = match app.authenticate().admin(&request).await {
//!         Ok(ctx) => ctx,
//!         // Redirects, 401 reauthorization responses and bounce pages.
//!         Err(error) => return error.into_response(),
//!     };
//!
//!     let data = ctx.admin.graphql("{ products(first: 5) { nodes { title } } }", None).await;
//!     // ...
//! }
//! ```
//!
//! ## Design Principles
//!
//! - **No global state**: configuration is instance-based and passed explicitly
//! - **Fail-fast validation**: all newtypes validate on construction
//! - **Thread-safe**: all public types are `Send + Sync`
//! - **Control flow as values**: responses the route must send instead of
//!   running its handler are returned as [`AuthenticateError::Response`]

mod app;
pub mod auth;
pub mod clients;
pub mod config;
pub mod error;
mod headers;
pub mod session;
pub mod session_storage;
pub mod webhooks;

pub use app::{respond, AfterAuth, Authenticate, HookError, Public, ShopifyApp};
pub use auth::{
    AdminContext, AppProxyContext, AppResponse, AuthenticateError, CheckoutContext, LoginError,
    LoginErrors, OAuthError, SessionTokenPayload, WebhookContext,
};
pub use clients::{AdminApiClient, AdminApiError};
pub use config::{
    ApiKey, ApiSecretKey, ApiVersion, AppConfig, AppConfigBuilder, AppDistribution, AppUrl,
    EmbeddedAuthStrategy, ShopDomain,
};
pub use error::ConfigError;
pub use headers::{add_checkout_cors_headers, add_cors_headers, add_document_response_headers};
pub use session::{AccessTokenResponse, AssociatedUser, AuthScopes, Session};
#[cfg(feature = "mongodb")]
pub use session_storage::MongoDbSessionStorage;
pub use session_storage::{MemorySessionStorage, SessionStorage, SessionStorageError};
