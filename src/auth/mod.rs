//! Request authentication.
//!
//! The entry points live on [`Authenticate`](crate::Authenticate), returned by
//! [`ShopifyApp::authenticate`](crate::ShopifyApp::authenticate):
//!
//! - [`admin`](crate::Authenticate::admin): requests from merchants using the
//!   app, embedded in the Shopify admin or standalone
//! - [`public`](crate::Authenticate::public): checkout extensions and app proxy
//!   requests
//! - [`webhook`](crate::Authenticate::webhook): webhook deliveries
//!
//! Each operation takes an [`http::Request`] whose body implements
//! `AsRef<[u8]>` and returns either a context for the route handler or an
//! [`AuthenticateError`]. [`AuthenticateError::Response`] carries the
//! response the route must send instead (redirects, `401` reauthorization
//! responses, bounce pages ...).
//!
//! The building blocks are public as well, for apps that assemble their own
//! flows: [`hmac`] signatures, [`SessionTokenPayload`] decoding, the
//! [`token_exchange`] grants, the OAuth [`oauth`] redirects and the
//! [`app_bridge`] responses.

pub(crate) mod admin;
pub mod app_bridge;
mod error;
pub mod hmac;
pub(crate) mod login;
pub mod oauth;
pub(crate) mod public;
mod session_token;
pub mod token_exchange;
pub(crate) mod webhook;

pub use admin::AdminContext;
pub use error::{AuthenticateError, OAuthError};
pub use login::{LoginError, LoginErrors};
pub use public::{AppProxyContext, CheckoutContext};
pub use session_token::SessionTokenPayload;
pub use webhook::WebhookContext;

use http::{header, HeaderMap, Request, StatusCode, Uri};

/// Response type produced by the authentication layer.
pub type AppResponse = http::Response<String>;

/// Parses the query string of `uri` into decoded key/value pairs.
pub(crate) fn query_pairs(uri: &Uri) -> Vec<(String, String)> {
    uri.query()
        .map(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default()
}

/// Returns the first value of the query parameter `name`.
pub(crate) fn query_param<B>(request: &Request<B>, name: &str) -> Option<String> {
    query_pairs(request.uri())
        .into_iter()
        .find_map(|(key, value)| (key == name).then_some(value))
}

/// Returns the token of an `Authorization: Bearer` header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Returns the value of the cookie `name`.
pub(crate) fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find_map(|(key, value)| (key == name).then(|| value.to_string()))
}

/// Builds a response with `status` and `body`.
pub(crate) fn response(status: StatusCode, body: impl Into<String>) -> AppResponse {
    let mut response = AppResponse::new(body.into());
    *response.status_mut() = status;
    response
}

/// Builds a `302 Found` redirect to `location`.
pub(crate) fn redirect(location: &str) -> AppResponse {
    let mut response = response(StatusCode::FOUND, String::new());
    if let Ok(value) = location.parse() {
        response.headers_mut().insert(header::LOCATION, value);
    }
    response
}

/// Shorthand for an [`AuthenticateError::Response`] with an empty body.
pub(crate) fn reject(status: StatusCode) -> AuthenticateError {
    AuthenticateError::response(response(status, String::new()))
}
