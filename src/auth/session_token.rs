//! App Bridge session tokens.
//!
//! Embedded apps receive a short-lived JWT from App Bridge on every request,
//! either as an `Authorization: Bearer` header (fetch requests) or as the
//! `id_token` query parameter (document requests). The token is signed
//! with the app's API secret using HS256 and carries:
//!
//! - `iss`: `https://{shop}/admin` for admin tokens
//! - `dest`: `https://{shop}`
//! - `aud`: the app's API key
//! - `sub`: the staff member's user id (admin tokens) or customer id
//! - `exp`, `nbf`, `iat`, `jti`, `sid`
//!
//! Time-based claims are checked with a 10 second leeway.

use crate::auth::OAuthError;
use crate::config::{AppConfig, ShopDomain};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

const JWT_LEEWAY_SECS: u64 = 10;

/// Decoded claims of an App Bridge session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokenPayload {
    /// Issuer, e.g. `https://shop.myshopify.com/admin`.
    pub iss: String,
    /// Destination shop, e.g. `https://shop.myshopify.com`.
    pub dest: String,
    /// Audience: the app's API key.
    pub aud: String,
    /// Subject: the user id for admin tokens.
    #[serde(default)]
    pub sub: Option<String>,
    /// Expiration (seconds since the epoch).
    pub exp: i64,
    /// Not before (seconds since the epoch).
    pub nbf: i64,
    /// Issued at (seconds since the epoch).
    pub iat: i64,
    /// Unique token id.
    pub jti: String,
    /// Shopify session id.
    #[serde(default)]
    pub sid: Option<String>,
}

impl SessionTokenPayload {
    /// Decodes and validates a session token.
    ///
    /// The signature is checked with the current secret, then the old one.
    /// The audience must equal the app's API key.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::InvalidSessionToken`] if the signature, timing
    /// claims, audience or destination are invalid.
    pub fn decode(token: &str, config: &AppConfig) -> Result<Self, OAuthError> {
        let mut last_error = None;
        let mut payload = None;

        for secret in config.secrets() {
            match Self::decode_with_key(token, secret) {
                Ok(claims) => {
                    payload = Some(claims);
                    break;
                }
                Err(error) => {
                    last_error.get_or_insert(error);
                }
            }
        }

        let payload = payload.ok_or_else(|| OAuthError::InvalidSessionToken {
            reason: last_error.map_or_else(
                || "no secret configured".to_string(),
                |error| format!("Error decoding session token: {error}"),
            ),
        })?;

        if payload.aud != config.api_key().as_ref() {
            return Err(OAuthError::InvalidSessionToken {
                reason: "Session token had invalid API key".to_string(),
            });
        }

        if payload.shop().is_none() {
            return Err(OAuthError::InvalidSessionToken {
                reason: format!("Session token has an invalid destination '{}'", payload.dest),
            });
        }

        Ok(payload)
    }

    fn decode_with_key(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = JWT_LEEWAY_SECS;
        validation.validate_nbf = true;
        // Audience is compared against the API key after decoding.
        validation.validate_aud = false;

        let key = DecodingKey::from_secret(secret.as_bytes());
        Ok(decode::<Self>(token, &key, &validation)?.claims)
    }

    /// Returns the shop the token was issued for, from the `dest` claim.
    #[must_use]
    pub fn shop(&self) -> Option<ShopDomain> {
        ShopDomain::new(self.dest.as_str()).ok()
    }

    /// Returns the staff member's user id for admin tokens.
    #[must_use]
    pub fn user_id(&self) -> Option<u64> {
        if !self.iss.ends_with("/admin") {
            return None;
        }
        self.sub.as_deref().and_then(|sub| sub.parse().ok())
    }
}

// Verify SessionTokenPayload is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SessionTokenPayload>();
};
