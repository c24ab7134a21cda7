//! Access tokens from Shopify's token endpoint.
//!
//! Two grants are supported against `https://{shop}/admin/oauth/access_token`:
//!
//! - **Token exchange** (RFC 8693): an App Bridge session token is traded for
//!   an online or offline access token without any redirect. Used by
//!   embedded apps.
//! - **Authorization code**: the `code` Shopify sends to the OAuth callback
//!   is traded for an access token.

use crate::auth::OAuthError;
use crate::clients::user_agent;
use crate::config::{AppConfig, ShopDomain};
use crate::session::{AccessTokenResponse, Session};
use serde::{Deserialize, Serialize};

const TOKEN_EXCHANGE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";

const ID_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:id_token";

/// Kind of access token requested by a token exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedTokenType {
    /// User-specific, expiring token.
    OnlineAccessToken,
    /// App installation token.
    OfflineAccessToken,
}

impl RequestedTokenType {
    const fn as_urn(self) -> &'static str {
        match self {
            Self::OnlineAccessToken => "urn:shopify:params:oauth:token-type:online-access-token",
            Self::OfflineAccessToken => "urn:shopify:params:oauth:token-type:offline-access-token",
        }
    }
}

#[derive(Debug, Serialize)]
struct TokenExchangeRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'a str,
    subject_token: &'a str,
    subject_token_type: &'a str,
    requested_token_type: &'a str,
}

#[derive(Debug, Serialize)]
struct AuthorizationCodeRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
}

/// Exchanges an App Bridge session token for an access token.
///
/// The session token must already have been validated by the caller.
///
/// # Errors
///
/// Returns [`OAuthError::InvalidSessionToken`] when Shopify rejects the
/// session token, and [`OAuthError::TokenRequestFailed`] for other failures.
pub async fn exchange_token(
    config: &AppConfig,
    shop: &ShopDomain,
    session_token: &str,
    requested_token_type: RequestedTokenType,
) -> Result<Session, OAuthError> {
    let body = TokenExchangeRequest {
        client_id: config.api_key().as_ref(),
        client_secret: config.api_secret_key().as_ref(),
        grant_type: TOKEN_EXCHANGE_GRANT_TYPE,
        subject_token: session_token,
        subject_token_type: ID_TOKEN_TYPE,
        requested_token_type: requested_token_type.as_urn(),
    };

    tracing::debug!(shop = %shop, token_type = ?requested_token_type, "Exchanging session token");
    request_access_token(config, shop, &body).await
}

/// Exchanges an OAuth authorization code for an access token.
///
/// # Errors
///
/// Returns [`OAuthError::TokenRequestFailed`] if Shopify rejects the code.
pub async fn exchange_authorization_code(
    config: &AppConfig,
    shop: &ShopDomain,
    code: &str,
) -> Result<Session, OAuthError> {
    let body = AuthorizationCodeRequest {
        client_id: config.api_key().as_ref(),
        client_secret: config.api_secret_key().as_ref(),
        code,
    };

    tracing::debug!(shop = %shop, "Exchanging authorization code");
    request_access_token(config, shop, &body).await
}

async fn request_access_token<T: Serialize + Sync>(
    config: &AppConfig,
    shop: &ShopDomain,
    body: &T,
) -> Result<Session, OAuthError> {
    let url = format!("{}/admin/oauth/access_token", config.shop_origin(shop));

    let response = reqwest::Client::new()
        .post(&url)
        .header(reqwest::header::USER_AGENT, user_agent(config))
        .header(reqwest::header::ACCEPT, "application/json")
        .json(body)
        .send()
        .await?;

    let status = response.status().as_u16();

    if !response.status().is_success() {
        let error_body = response.text().await.unwrap_or_default();

        if status == 400 {
            let rejected = serde_json::from_str::<TokenErrorResponse>(&error_body)
                .ok()
                .and_then(|error| error.error)
                .is_some_and(|error| error == "invalid_subject_token");
            if rejected {
                return Err(OAuthError::InvalidSessionToken {
                    reason: "Session token was rejected by token exchange".to_string(),
                });
            }
        }

        return Err(OAuthError::TokenRequestFailed {
            status,
            message: error_body,
        });
    }

    let token_response: AccessTokenResponse =
        response
            .json()
            .await
            .map_err(|e| OAuthError::TokenRequestFailed {
                status,
                message: format!("Failed to parse token response: {e}"),
            })?;

    Ok(Session::from_access_token_response(shop.clone(), &token_response))
}
