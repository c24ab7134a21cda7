//! Authentication of requests that reach the app from outside the admin:
//! checkout UI extensions and app proxies.

use crate::app::ShopifyApp;
use crate::auth::{bearer_token, hmac, query_pairs, response, AuthenticateError, SessionTokenPayload};
use crate::clients::AdminApiClient;
use crate::config::{AppConfig, ShopDomain};
use crate::headers::add_checkout_cors_headers;
use crate::session::Session;
use http::{HeaderMap, Method, Request, StatusCode};

/// An authenticated checkout extension request.
#[derive(Clone, Debug)]
pub struct CheckoutContext {
    /// The decoded session token sent by the extension.
    pub session_token: SessionTokenPayload,
}

impl CheckoutContext {
    /// Adds the CORS headers the extension needs to read the response.
    pub fn add_cors_headers(&self, headers: &mut HeaderMap) {
        add_checkout_cors_headers(headers);
    }
}

/// An authenticated app proxy request.
#[derive(Clone, Debug)]
pub struct AppProxyContext {
    /// Shop the storefront request came from.
    pub shop: ShopDomain,
    /// Customer id when a customer is logged in to the storefront.
    pub logged_in_customer_id: Option<String>,
    /// The shop's offline session, if the app is installed.
    pub session: Option<Session>,
    /// Admin API client for `session`.
    pub admin: Option<AdminApiClient>,
}

fn cors_rejection(status: StatusCode) -> AuthenticateError {
    let mut response = response(status, String::new());
    add_checkout_cors_headers(response.headers_mut());
    AuthenticateError::response(response)
}

pub(crate) fn authenticate_checkout<B>(
    config: &AppConfig,
    request: &Request<B>,
) -> Result<CheckoutContext, AuthenticateError> {
    if request.method() == Method::OPTIONS {
        return Err(cors_rejection(StatusCode::NO_CONTENT));
    }

    let Some(token) = bearer_token(request.headers()) else {
        tracing::debug!("Checkout request without a session token");
        return Err(cors_rejection(StatusCode::UNAUTHORIZED));
    };

    match SessionTokenPayload::decode(token, config) {
        Ok(session_token) => Ok(CheckoutContext { session_token }),
        Err(error) => {
            tracing::warn!("Rejecting checkout request: {error}");
            Err(cors_rejection(StatusCode::UNAUTHORIZED))
        }
    }
}

pub(crate) async fn authenticate_app_proxy<B>(
    app: &ShopifyApp,
    request: &Request<B>,
) -> Result<AppProxyContext, AuthenticateError> {
    let config = app.config();
    let params = query_pairs(request.uri());
    let param = |name: &str| {
        params
            .iter()
            .find_map(|(key, value)| (key == name).then(|| value.clone()))
    };

    let signature = param("signature").unwrap_or_default();
    if !hmac::verify_hex(&hmac::app_proxy_signable(&params), &signature, config.secrets()) {
        tracing::warn!("Rejecting app proxy request with an invalid signature");
        return Err(crate::auth::reject(StatusCode::BAD_REQUEST));
    }

    let Some(shop) = param("shop").and_then(|shop| ShopDomain::new(shop).ok()) else {
        tracing::warn!("Rejecting app proxy request without a valid shop");
        return Err(crate::auth::reject(StatusCode::BAD_REQUEST));
    };

    let session = app
        .session_storage()
        .load_session(&Session::offline_id(&shop))
        .await?;
    let admin = session
        .as_ref()
        .map(|session| AdminApiClient::new(config, session));

    Ok(AppProxyContext {
        shop,
        logged_in_customer_id: param("logged_in_customer_id").filter(|id| !id.is_empty()),
        session,
        admin,
    })
}
