//! Configuration types for the Shopify app SDK.
//!
//! # Overview
//!
//! - [`AppConfig`]: everything the app layer needs to authenticate requests
//! - [`AppConfigBuilder`]: builder for [`AppConfig`]
//! - [`ApiKey`], [`ApiSecretKey`], [`ShopDomain`], [`AppUrl`]: validated newtypes
//! - [`ApiVersion`]: the Admin API version used for outbound calls
//!
//! # Example
//!
//! ```rust
//! use shopify_app::{AppConfig, ApiKey, ApiSecretKey, AppUrl};
//!
//! let config = AppConfig::builder()
//!     .api_key(ApiKey::new("my-api-key").unwrap())
//!     .api_secret_key(ApiSecretKey::new("my-secret").unwrap())
//!     .app_url(AppUrl::new("https://myapp.example.com").unwrap())
//!     .scopes("read_products".parse().unwrap())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.auth_path(), "/auth");
//! assert_eq!(config.callback_path(), "/auth/callback");
//! ```

mod newtypes;
mod version;

pub use newtypes::{ApiKey, ApiSecretKey, AppUrl, ShopDomain};
pub use version::ApiVersion;

use crate::error::ConfigError;
use crate::session::AuthScopes;
use crate::webhooks::WebhookRegistration;

/// How the app is distributed to merchants.
///
/// Apps installed from the Shopify admin cannot use the login page, since
/// merchants never type a shop domain for them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AppDistribution {
    /// Listed on the Shopify App Store.
    #[default]
    AppStore,
    /// Custom app for a single merchant, installed through a link.
    SingleMerchant,
    /// Created and installed from the Shopify admin.
    ShopifyAdmin,
}

/// How embedded apps obtain access tokens when no usable session is stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmbeddedAuthStrategy {
    /// Exchange the App Bridge session token for an access token in place.
    #[default]
    TokenExchange,
    /// Send the merchant through the OAuth authorization code grant.
    AuthCodeFlow,
}

/// Configuration for a Shopify app.
///
/// `AppConfig` is `Clone + Send + Sync` and is shared by every request
/// handled through a [`ShopifyApp`](crate::ShopifyApp).
///
/// # Key Rotation
///
/// When `old_api_secret_key` is set, HMAC signatures and session tokens that
/// fail validation with the current secret are retried with the old one.
#[derive(Clone, Debug)]
pub struct AppConfig {
    api_key: ApiKey,
    api_secret_key: ApiSecretKey,
    old_api_secret_key: Option<ApiSecretKey>,
    scopes: AuthScopes,
    app_url: AppUrl,
    api_version: ApiVersion,
    is_embedded_app: bool,
    use_online_tokens: bool,
    auth_path_prefix: String,
    distribution: AppDistribution,
    embedded_auth_strategy: EmbeddedAuthStrategy,
    user_agent_prefix: Option<String>,
    webhooks: Vec<WebhookRegistration>,
    /// Mock server standing in for every shop in unit tests.
    #[cfg(test)]
    shop_origin_override: Option<String>,
}

impl AppConfig {
    /// Creates a new builder for constructing an `AppConfig`.
    #[must_use]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::new()
    }

    /// Builds a configuration from the conventional environment variables.
    ///
    /// Reads `SHOPIFY_API_KEY`, `SHOPIFY_API_SECRET` and `SHOPIFY_APP_URL`
    /// (required) and `SCOPES`, `SHOPIFY_API_VERSION`,
    /// `SHOPIFY_OLD_API_SECRET` (optional). Everything else keeps the
    /// builder defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] for a missing required variable,
    /// or the validation error of the offending value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::MissingEnvVar { name })
        };

        let mut builder = Self::builder()
            .api_key(ApiKey::new(required("SHOPIFY_API_KEY")?)?)
            .api_secret_key(ApiSecretKey::new(required("SHOPIFY_API_SECRET")?)?)
            .app_url(AppUrl::new(required("SHOPIFY_APP_URL")?)?);

        if let Some(scopes) = lookup("SCOPES") {
            builder = builder.scopes(scopes.parse()?);
        }
        if let Some(version) = lookup("SHOPIFY_API_VERSION") {
            builder = builder.api_version(version.parse()?);
        }
        if let Some(old_secret) = lookup("SHOPIFY_OLD_API_SECRET") {
            builder = builder.old_api_secret_key(ApiSecretKey::new(old_secret)?);
        }

        builder.build()
    }

    /// Returns the API key.
    #[must_use]
    pub const fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    /// Returns the API secret key.
    #[must_use]
    pub const fn api_secret_key(&self) -> &ApiSecretKey {
        &self.api_secret_key
    }

    /// Returns the old API secret key, if configured.
    #[must_use]
    pub const fn old_api_secret_key(&self) -> Option<&ApiSecretKey> {
        self.old_api_secret_key.as_ref()
    }

    /// Returns the secrets to try, current one first.
    pub(crate) fn secrets(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.api_secret_key.as_ref())
            .chain(self.old_api_secret_key.as_ref().map(AsRef::as_ref))
    }

    /// Returns the OAuth scopes the app requests.
    #[must_use]
    pub const fn scopes(&self) -> &AuthScopes {
        &self.scopes
    }

    /// Returns the public URL of the app.
    #[must_use]
    pub const fn app_url(&self) -> &AppUrl {
        &self.app_url
    }

    /// Returns the Admin API version.
    #[must_use]
    pub const fn api_version(&self) -> &ApiVersion {
        &self.api_version
    }

    /// Returns whether the app is rendered inside the Shopify admin.
    #[must_use]
    pub const fn is_embedded_app(&self) -> bool {
        self.is_embedded_app
    }

    /// Returns whether user-specific (online) sessions are used for admin requests.
    #[must_use]
    pub const fn use_online_tokens(&self) -> bool {
        self.use_online_tokens
    }

    /// Returns how the app is distributed.
    #[must_use]
    pub const fn distribution(&self) -> AppDistribution {
        self.distribution
    }

    /// Returns the strategy embedded apps use to obtain access tokens.
    #[must_use]
    pub const fn embedded_auth_strategy(&self) -> EmbeddedAuthStrategy {
        self.embedded_auth_strategy
    }

    /// Returns the user agent prefix, if configured.
    #[must_use]
    pub fn user_agent_prefix(&self) -> Option<&str> {
        self.user_agent_prefix.as_deref()
    }

    /// Returns the webhook subscriptions registered by `register_webhooks`.
    #[must_use]
    pub fn webhooks(&self) -> &[WebhookRegistration] {
        &self.webhooks
    }

    /// Origin of the shop's Admin endpoints (`https://{shop}`).
    pub(crate) fn shop_origin(&self, shop: &ShopDomain) -> String {
        #[cfg(test)]
        if let Some(origin) = &self.shop_origin_override {
            return origin.clone();
        }
        format!("https://{}", shop.as_ref())
    }

    /// Points every shop's Admin endpoints at `origin` (mock servers).
    #[cfg(test)]
    pub(crate) fn with_shop_origin(mut self, origin: impl Into<String>) -> Self {
        self.shop_origin_override = Some(origin.into());
        self
    }

    /// Path that begins the OAuth flow, e.g. `/auth`.
    #[must_use]
    pub fn auth_path(&self) -> &str {
        &self.auth_path_prefix
    }

    /// Path Shopify redirects to after the merchant grants access.
    #[must_use]
    pub fn callback_path(&self) -> String {
        format!("{}/callback", self.auth_path_prefix)
    }

    /// Path of the page that breaks out of the admin iframe.
    #[must_use]
    pub fn exit_iframe_path(&self) -> String {
        format!("{}/exit-iframe", self.auth_path_prefix)
    }

    /// Path of the bounce page that fetches a fresh session token.
    #[must_use]
    pub fn session_token_path(&self) -> String {
        format!("{}/session-token", self.auth_path_prefix)
    }

    /// Path of the login page.
    #[must_use]
    pub fn login_path(&self) -> String {
        format!("{}/login", self.auth_path_prefix)
    }
}

// Verify AppConfig is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AppConfig>();
};

/// Builder for constructing [`AppConfig`] instances.
///
/// Required fields are `api_key`, `api_secret_key` and `app_url`.
///
/// # Defaults
///
/// - `api_version`: latest stable version
/// - `is_embedded_app`: `true`
/// - `use_online_tokens`: `false`
/// - `auth_path_prefix`: `/auth`
/// - `distribution`: [`AppDistribution::AppStore`]
/// - `embedded_auth_strategy`: [`EmbeddedAuthStrategy::TokenExchange`]
/// - `scopes`, `webhooks`: empty
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    api_key: Option<ApiKey>,
    api_secret_key: Option<ApiSecretKey>,
    old_api_secret_key: Option<ApiSecretKey>,
    scopes: Option<AuthScopes>,
    app_url: Option<AppUrl>,
    api_version: Option<ApiVersion>,
    is_embedded_app: Option<bool>,
    use_online_tokens: Option<bool>,
    auth_path_prefix: Option<String>,
    distribution: Option<AppDistribution>,
    embedded_auth_strategy: Option<EmbeddedAuthStrategy>,
    user_agent_prefix: Option<String>,
    webhooks: Vec<WebhookRegistration>,
}

impl AppConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key (required).
    #[must_use]
    pub fn api_key(mut self, key: ApiKey) -> Self {
        self.api_key = Some(key);
        self
    }

    /// Sets the API secret key (required).
    #[must_use]
    pub fn api_secret_key(mut self, key: ApiSecretKey) -> Self {
        self.api_secret_key = Some(key);
        self
    }

    /// Sets the previous API secret key, accepted during key rotation.
    #[must_use]
    pub fn old_api_secret_key(mut self, key: ApiSecretKey) -> Self {
        self.old_api_secret_key = Some(key);
        self
    }

    /// Sets the OAuth scopes.
    #[must_use]
    pub fn scopes(mut self, scopes: AuthScopes) -> Self {
        self.scopes = Some(scopes);
        self
    }

    /// Sets the public app URL (required).
    #[must_use]
    pub fn app_url(mut self, url: AppUrl) -> Self {
        self.app_url = Some(url);
        self
    }

    /// Sets the Admin API version.
    #[must_use]
    pub fn api_version(mut self, version: ApiVersion) -> Self {
        self.api_version = Some(version);
        self
    }

    /// Sets whether the app is embedded in the Shopify admin.
    #[must_use]
    pub const fn is_embedded_app(mut self, embedded: bool) -> Self {
        self.is_embedded_app = Some(embedded);
        self
    }

    /// Sets whether admin requests use online (user-specific) sessions.
    #[must_use]
    pub const fn use_online_tokens(mut self, online: bool) -> Self {
        self.use_online_tokens = Some(online);
        self
    }

    /// Sets the path prefix for the auth routes.
    ///
    /// A trailing slash is removed and a leading one added when missing.
    #[must_use]
    pub fn auth_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.trim_end_matches('/');
        self.auth_path_prefix = Some(if prefix.starts_with('/') {
            prefix.to_string()
        } else {
            format!("/{prefix}")
        });
        self
    }

    /// Sets how the app is distributed.
    #[must_use]
    pub const fn distribution(mut self, distribution: AppDistribution) -> Self {
        self.distribution = Some(distribution);
        self
    }

    /// Sets how embedded apps obtain access tokens.
    #[must_use]
    pub const fn embedded_auth_strategy(mut self, strategy: EmbeddedAuthStrategy) -> Self {
        self.embedded_auth_strategy = Some(strategy);
        self
    }

    /// Sets the user agent prefix for outbound requests.
    #[must_use]
    pub fn user_agent_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.user_agent_prefix = Some(prefix.into());
        self
    }

    /// Adds a webhook subscription.
    ///
    /// A later registration for the same topic replaces the earlier one.
    #[must_use]
    pub fn webhook(mut self, registration: WebhookRegistration) -> Self {
        self.webhooks.retain(|existing| existing.topic != registration.topic);
        self.webhooks.push(registration);
        self
    }

    /// Builds the [`AppConfig`], validating that required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredField`] if `api_key`,
    /// `api_secret_key` or `app_url` are not set.
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let api_key = self
            .api_key
            .ok_or(ConfigError::MissingRequiredField { field: "api_key" })?;
        let api_secret_key = self
            .api_secret_key
            .ok_or(ConfigError::MissingRequiredField {
                field: "api_secret_key",
            })?;
        let app_url = self
            .app_url
            .ok_or(ConfigError::MissingRequiredField { field: "app_url" })?;

        Ok(AppConfig {
            api_key,
            api_secret_key,
            old_api_secret_key: self.old_api_secret_key,
            scopes: self.scopes.unwrap_or_default(),
            app_url,
            api_version: self.api_version.unwrap_or_else(ApiVersion::latest),
            is_embedded_app: self.is_embedded_app.unwrap_or(true),
            use_online_tokens: self.use_online_tokens.unwrap_or(false),
            auth_path_prefix: self
                .auth_path_prefix
                .unwrap_or_else(|| "/auth".to_string()),
            distribution: self.distribution.unwrap_or_default(),
            embedded_auth_strategy: self.embedded_auth_strategy.unwrap_or_default(),
            user_agent_prefix: self.user_agent_prefix,
            webhooks: self.webhooks,
            #[cfg(test)]
            shop_origin_override: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhooks::{WebhookRegistrationBuilder, WebhookTopic};
    use std::collections::HashMap;

    fn required_builder() -> AppConfigBuilder {
        AppConfig::builder()
            .api_key(ApiKey::new("key").unwrap())
            .api_secret_key(ApiSecretKey::new("secret").unwrap())
            .app_url(AppUrl::new("https://myapp.example.com").unwrap())
    }

    #[test]
    fn test_shop_origin_defaults_to_shop_domain() {
        let config = required_builder().build().unwrap();
        let shop = ShopDomain::new("my-store").unwrap();

        assert_eq!(config.shop_origin(&shop), "https://my-store.myshopify.com");
        assert_eq!(
            config.with_shop_origin("http://127.0.0.1:9999").shop_origin(&shop),
            "http://127.0.0.1:9999"
        );
    }

    #[test]
    fn test_builder_requires_app_url() {
        let result = AppConfig::builder()
            .api_key(ApiKey::new("key").unwrap())
            .api_secret_key(ApiSecretKey::new("secret").unwrap())
            .build();

        assert!(matches!(
            result,
            Err(ConfigError::MissingRequiredField { field: "app_url" })
        ));
    }

    #[test]
    fn test_builder_requires_api_secret_key() {
        let result = AppConfig::builder()
            .api_key(ApiKey::new("key").unwrap())
            .app_url(AppUrl::new("https://myapp.example.com").unwrap())
            .build();

        assert!(matches!(
            result,
            Err(ConfigError::MissingRequiredField {
                field: "api_secret_key"
            })
        ));
    }

    #[test]
    fn test_builder_provides_sensible_defaults() {
        let config = required_builder().build().unwrap();

        assert_eq!(config.api_version(), &ApiVersion::latest());
        assert!(config.is_embedded_app());
        assert!(!config.use_online_tokens());
        assert!(config.scopes().is_empty());
        assert_eq!(config.auth_path(), "/auth");
        assert_eq!(config.distribution(), AppDistribution::AppStore);
        assert_eq!(
            config.embedded_auth_strategy(),
            EmbeddedAuthStrategy::TokenExchange
        );
        assert!(config.webhooks().is_empty());
        assert!(config.old_api_secret_key().is_none());
    }

    #[test]
    fn test_auth_path_prefix_is_normalized() {
        let config = required_builder()
            .auth_path_prefix("api/auth/")
            .build()
            .unwrap();

        assert_eq!(config.auth_path(), "/api/auth");
        assert_eq!(config.callback_path(), "/api/auth/callback");
        assert_eq!(config.exit_iframe_path(), "/api/auth/exit-iframe");
        assert_eq!(config.session_token_path(), "/api/auth/session-token");
        assert_eq!(config.login_path(), "/api/auth/login");
    }

    #[test]
    fn test_secrets_yields_current_then_old() {
        let config = required_builder()
            .old_api_secret_key(ApiSecretKey::new("old-secret").unwrap())
            .build()
            .unwrap();

        let secrets: Vec<&str> = config.secrets().collect();
        assert_eq!(secrets, vec!["secret", "old-secret"]);
    }

    #[test]
    fn test_webhook_replaces_same_topic() {
        let config = required_builder()
            .webhook(WebhookRegistrationBuilder::http(WebhookTopic::AppUninstalled, "/a").build())
            .webhook(WebhookRegistrationBuilder::http(WebhookTopic::AppUninstalled, "/b").build())
            .build()
            .unwrap();

        assert_eq!(config.webhooks().len(), 1);
    }

    #[test]
    fn test_from_lookup_reads_variables() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SHOPIFY_API_KEY", "env-key"),
            ("SHOPIFY_API_SECRET", "env-secret"),
            ("SHOPIFY_APP_URL", "https://env.example.com"),
            ("SCOPES", "write_products"),
            ("SHOPIFY_API_VERSION", "2025-07"),
        ]);

        let config =
            AppConfig::from_lookup(|name| vars.get(name).map(ToString::to_string)).unwrap();

        assert_eq!(config.api_key().as_ref(), "env-key");
        assert_eq!(config.app_url().as_ref(), "https://env.example.com");
        assert_eq!(config.api_version(), &ApiVersion::V2025_07);
        assert!(config.scopes().iter().any(|s| s == "read_products"));
    }

    #[test]
    fn test_from_lookup_reports_missing_variable() {
        let result = AppConfig::from_lookup(|name| {
            (name == "SHOPIFY_API_KEY").then(|| "key".to_string())
        });

        assert!(matches!(
            result,
            Err(ConfigError::MissingEnvVar {
                name: "SHOPIFY_API_SECRET"
            })
        ));
    }

    #[test]
    fn test_config_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AppConfig>();
    }
}
