//! OAuth authorization code grant.
//!
//! [`begin_auth`] sends the merchant to Shopify's consent screen and drops a
//! random state nonce in an `HttpOnly` cookie. When Shopify redirects back,
//! [`validate_callback`] checks the HMAC of the query string, compares the
//! `state` parameter with the cookie and returns the parameters needed to
//! exchange the authorization code.
//!
//! Standalone (non-embedded) apps have no session token to identify the
//! merchant on later requests, so after the callback they receive a signed
//! session cookie holding the session id ([`session_cookie`]).

use crate::auth::{cookie, hmac, query_pairs, redirect, AppResponse, OAuthError};
use crate::config::{AppConfig, ShopDomain};
use http::header::SET_COOKIE;
use http::{HeaderMap, HeaderValue, Request};
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Cookie holding the OAuth state nonce between `begin` and `callback`.
pub const STATE_COOKIE: &str = "shopify_app_state";

/// Cookie identifying a standalone app's session.
pub const SESSION_COOKIE: &str = "shopify_app_session";

const NONCE_LENGTH: usize = 15;
const STATE_COOKIE_MAX_AGE_SECS: u32 = 600;

/// Query parameters of a validated OAuth callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackParams {
    /// The shop that granted access.
    pub shop: ShopDomain,
    /// Authorization code to exchange for an access token.
    pub code: String,
    /// Base64 `host` parameter identifying the admin the app was opened from.
    pub host: Option<String>,
}

fn nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LENGTH)
        .map(char::from)
        .collect()
}

fn cookie_attributes(config: &AppConfig, path: &str, max_age: u32) -> String {
    let secure = if config.app_url().scheme() == "https" {
        "; Secure"
    } else {
        ""
    };
    format!("Path={path}; Max-Age={max_age}; HttpOnly; SameSite=Lax{secure}")
}

/// Builds the authorization URL for `shop`, using `state` as the nonce.
#[must_use]
pub fn authorization_url(config: &AppConfig, shop: &ShopDomain, state: &str, is_online: bool) -> String {
    let redirect_uri = config.app_url().join_path(&config.callback_path());

    let mut params = vec![
        ("client_id", config.api_key().as_ref().to_string()),
        ("scope", config.scopes().to_string()),
        ("redirect_uri", redirect_uri),
        ("state", state.to_string()),
    ];
    if is_online {
        params.push(("grant_options[]", "per-user".to_string()));
    }

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!("https://{}/admin/oauth/authorize?{query}", shop.as_ref())
}

/// Starts the OAuth flow: a redirect to Shopify's consent screen carrying
/// a fresh state nonce, which is also set as a cookie scoped to the
/// callback path.
#[must_use]
pub fn begin_auth(config: &AppConfig, shop: &ShopDomain, is_online: bool) -> AppResponse {
    let state = nonce();
    let mut response = redirect(&authorization_url(config, shop, &state, is_online));

    let cookie = format!(
        "{STATE_COOKIE}={state}; {}",
        cookie_attributes(config, &config.callback_path(), STATE_COOKIE_MAX_AGE_SECS)
    );
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().append(SET_COOKIE, value);
    }

    tracing::debug!(shop = %shop, is_online, "Beginning OAuth");
    response
}

/// Validates an OAuth callback request.
///
/// # Errors
///
/// - [`OAuthError::InvalidCallback`] if `shop` or `code` are missing or invalid
/// - [`OAuthError::InvalidHmac`] if the signature does not match either secret
/// - [`OAuthError::StateMismatch`] if `state` does not match the state cookie
pub fn validate_callback<B>(
    config: &AppConfig,
    request: &Request<B>,
) -> Result<CallbackParams, OAuthError> {
    let params = query_pairs(request.uri());
    let param = |name: &str| {
        params
            .iter()
            .find_map(|(key, value)| (key == name).then(|| value.clone()))
    };

    let received_hmac = param("hmac").ok_or_else(|| OAuthError::InvalidCallback {
        reason: "missing hmac parameter".to_string(),
    })?;
    if !hmac::verify_hex(&hmac::oauth_signable(&params), &received_hmac, config.secrets()) {
        return Err(OAuthError::InvalidHmac);
    }

    let state = param("state").unwrap_or_default();
    let expected = cookie(request.headers(), STATE_COOKIE).unwrap_or_default();
    if expected.is_empty() || !hmac::constant_time_compare(&state, &expected) {
        return Err(OAuthError::StateMismatch);
    }

    let shop = param("shop")
        .and_then(|shop| ShopDomain::new(shop).ok())
        .ok_or_else(|| OAuthError::InvalidCallback {
            reason: "missing or invalid shop parameter".to_string(),
        })?;
    let code = param("code")
        .filter(|code| !code.is_empty())
        .ok_or_else(|| OAuthError::InvalidCallback {
            reason: "missing code parameter".to_string(),
        })?;

    Ok(CallbackParams {
        shop,
        code,
        host: param("host"),
    })
}

/// `Set-Cookie` value that clears the state cookie.
#[must_use]
pub fn clear_state_cookie(config: &AppConfig) -> String {
    format!(
        "{STATE_COOKIE}=; {}",
        cookie_attributes(config, &config.callback_path(), 0)
    )
}

/// `Set-Cookie` value carrying the signed id of a standalone app's session.
#[must_use]
pub fn session_cookie(config: &AppConfig, session_id: &str) -> String {
    let signature = hmac::compute_signature(session_id, config.api_secret_key().as_ref());
    format!(
        "{SESSION_COOKIE}={}.{signature}; {}",
        urlencoding::encode(session_id),
        cookie_attributes(config, "/", 60 * 60 * 24 * 365)
    )
}

/// Reads and verifies the session cookie, returning the session id.
#[must_use]
pub fn read_session_cookie(config: &AppConfig, headers: &HeaderMap) -> Option<String> {
    let value = cookie(headers, SESSION_COOKIE)?;
    let (encoded_id, signature) = value.rsplit_once('.')?;
    let session_id = urlencoding::decode(encoded_id).ok()?.into_owned();

    hmac::verify_hex(&session_id, signature, config.secrets()).then_some(session_id)
}
