//! The [`ShopifyApp`] facade.

use crate::auth::{
    self, AdminContext, AppProxyContext, AppResponse, AuthenticateError, CheckoutContext,
    LoginErrors, WebhookContext,
};
use crate::clients::AdminApiClient;
use crate::config::{AppConfig, ShopDomain};
use crate::session::Session;
use crate::session_storage::{MemorySessionStorage, SessionStorage};
use crate::webhooks::{WebhookRegistrationResult, WebhookRegistry};
use async_trait::async_trait;
use http::{HeaderMap, Request};
use std::fmt;
use std::sync::Arc;

/// Error type returned by [`AfterAuth`] hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Hook run each time authentication obtains a new session.
///
/// Typical uses are registering webhooks and seeding per-shop data.
///
/// ```rust,ignore
/// struct RegisterWebhooks(AppConfig);
///
/// #[async_trait]
/// impl AfterAuth for RegisterWebhooks {
///     async fn after_auth(&self, _session: &Session, admin: &AdminApiClient) -> Result<(), HookError> {
///         WebhookRegistry::from_config(&self.0).register_all(admin).await;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait AfterAuth: Send + Sync {
    /// Called with the new session and a client bound to it.
    async fn after_auth(&self, session: &Session, admin: &AdminApiClient) -> Result<(), HookError>;
}

/// Entry point of the crate: configuration, session storage and the
/// authentication operations.
///
/// Cloning is cheap; every clone shares the same storage.
///
/// ```rust
/// use shopify_app::{ApiKey, ApiSecretKey, AppConfig, AppUrl, ShopifyApp};
///
/// let config = AppConfig::builder()
///     .api_key(ApiKey::new("key").unwrap())
///     .api_secret_key(ApiSecretKey::new("secret").unwrap())
///     .app_url(AppUrl::new("https://myapp.example.com").unwrap())
///     .build()
///     .unwrap();
///
/// let app = ShopifyApp::new(config);
/// assert_eq!(app.config().auth_path(), "/auth");
/// ```
#[derive(Clone)]
pub struct ShopifyApp {
    config: Arc<AppConfig>,
    storage: Arc<dyn SessionStorage>,
    after_auth: Option<Arc<dyn AfterAuth>>,
}

// Verify ShopifyApp is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ShopifyApp>();
};

impl fmt::Debug for ShopifyApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShopifyApp")
            .field("config", &self.config)
            .field("after_auth", &self.after_auth.is_some())
            .finish_non_exhaustive()
    }
}

impl ShopifyApp {
    /// Creates an app that keeps sessions in memory.
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self::with_session_storage(config, MemorySessionStorage::new())
    }

    /// Creates an app backed by `storage`.
    #[must_use]
    pub fn with_session_storage(config: AppConfig, storage: impl SessionStorage + 'static) -> Self {
        Self {
            config: Arc::new(config),
            storage: Arc::new(storage),
            after_auth: None,
        }
    }

    /// Sets the hook run after a new session is obtained.
    #[must_use]
    pub fn with_after_auth(mut self, hook: impl AfterAuth + 'static) -> Self {
        self.after_auth = Some(Arc::new(hook));
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Returns the session storage.
    #[must_use]
    pub fn session_storage(&self) -> &dyn SessionStorage {
        self.storage.as_ref()
    }

    /// Adds the Shopify document headers to an HTML response.
    ///
    /// See [`crate::add_document_response_headers`].
    pub fn add_document_response_headers(&self, headers: &mut HeaderMap, shop: Option<&ShopDomain>) {
        crate::headers::add_document_response_headers(&self.config, headers, shop);
    }

    /// Registers the configured webhook subscriptions on the session's shop.
    pub async fn register_webhooks(&self, session: &Session) -> Vec<WebhookRegistrationResult> {
        let admin = AdminApiClient::new(&self.config, session);
        WebhookRegistry::from_config(&self.config)
            .register_all(&admin)
            .await
    }

    /// Handles the login form.
    ///
    /// Returns the validation errors to render, or
    /// [`AuthenticateError::Response`] with the redirect that starts
    /// authentication for a valid shop.
    ///
    /// # Errors
    ///
    /// See [`AuthenticateError`].
    pub fn login<B: AsRef<[u8]>>(
        &self,
        request: &Request<B>,
    ) -> Result<LoginErrors, AuthenticateError> {
        auth::login::login(&self.config, request)
    }

    /// Returns the request authentication operations.
    #[must_use]
    pub const fn authenticate(&self) -> Authenticate<'_> {
        Authenticate { app: self }
    }

    pub(crate) async fn run_after_auth(
        &self,
        session: &Session,
    ) -> Result<(), AuthenticateError> {
        let Some(hook) = &self.after_auth else {
            return Ok(());
        };

        let admin = AdminApiClient::new(&self.config, session);
        hook.after_auth(session, &admin).await.map_err(|error| {
            tracing::error!(shop = %session.shop, "after_auth hook failed: {error}");
            AuthenticateError::Hook(error)
        })
    }
}

/// Request authentication, returned by [`ShopifyApp::authenticate`].
#[derive(Clone, Copy, Debug)]
pub struct Authenticate<'a> {
    app: &'a ShopifyApp,
}

impl<'a> Authenticate<'a> {
    /// Authenticates a request from a merchant using the app.
    ///
    /// Also serves the auth routes under the configured auth path prefix,
    /// answering them with [`AuthenticateError::Response`].
    ///
    /// # Errors
    ///
    /// [`AuthenticateError::Response`] when the request must be answered
    /// with a redirect, a `401` reauthorization response or a bounce page.
    pub async fn admin<B>(&self, request: &Request<B>) -> Result<AdminContext, AuthenticateError> {
        auth::admin::authenticate_admin(self.app, request).await
    }

    /// Returns the authentication operations for public requests.
    #[must_use]
    pub const fn public(&self) -> Public<'a> {
        Public { app: self.app }
    }

    /// Authenticates a webhook delivery.
    ///
    /// # Errors
    ///
    /// [`AuthenticateError::Response`] with `405`, `400` or `401` when the
    /// request is not a valid delivery.
    pub async fn webhook<B: AsRef<[u8]>>(
        &self,
        request: &Request<B>,
    ) -> Result<WebhookContext, AuthenticateError> {
        auth::webhook::authenticate_webhook(self.app, request).await
    }
}

/// Authentication for requests that do not come from the admin.
#[derive(Clone, Copy, Debug)]
pub struct Public<'a> {
    app: &'a ShopifyApp,
}

impl Public<'_> {
    /// Authenticates a request from a checkout UI extension.
    ///
    /// # Errors
    ///
    /// [`AuthenticateError::Response`] with `204` for preflight requests and
    /// `401` when the session token is missing or invalid.
    pub fn checkout<B>(&self, request: &Request<B>) -> Result<CheckoutContext, AuthenticateError> {
        auth::public::authenticate_checkout(&self.app.config, request)
    }

    /// Authenticates an app proxy request.
    ///
    /// # Errors
    ///
    /// [`AuthenticateError::Response`] with `400` when the signature is
    /// missing or invalid.
    pub async fn app_proxy<B>(
        &self,
        request: &Request<B>,
    ) -> Result<AppProxyContext, AuthenticateError> {
        auth::public::authenticate_app_proxy(self.app, request).await
    }
}

/// Converts an authentication result into the response to send when it
/// failed, for frameworks that want a single return type.
///
/// ```rust,ignore
/// let ctx = match respond(app.authenticate().admin(&request).await) {
///     Ok(ctx) => ctx,
///     Err(response) => return response,
/// };
/// ```
pub fn respond<T>(result: Result<T, AuthenticateError>) -> Result<T, AppResponse> {
    result.map_err(AuthenticateError::into_response)
}
