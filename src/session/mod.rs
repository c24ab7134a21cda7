//! Sessions: the persisted record of a shop's access credentials.
//!
//! Shopify hands out two kinds of access tokens:
//!
//! - **Offline** tokens belong to the app installation. Their session id is
//!   `offline_{shop}` and they are used for webhooks and background work.
//! - **Online** tokens belong to a staff member, expire, and carry an
//!   [`AssociatedUser`]. Their session id is `{shop}_{user_id}`.
//!
//! Sessions serialize with serde so any [`SessionStorage`](crate::SessionStorage)
//! can persist them as a document or a JSON blob.
//!
//! ```rust
//! use shopify_app::{Session, ShopDomain};
//!
//! let shop = ShopDomain::new("my-store").unwrap();
//! let session = Session::new(
//!     Session::offline_id(&shop),
//!     shop,
//!     "shpat_token".to_string(),
//!     "read_products".parse().unwrap(),
//!     false,
//!     None,
//! );
//!
//! assert_eq!(session.id, "offline_my-store.myshopify.com");
//! assert!(session.is_active(&"read_products".parse().unwrap()));
//! ```

mod scopes;

pub use scopes::AuthScopes;

use crate::config::ShopDomain;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A Shopify staff member bound to an online session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociatedUser {
    /// The Shopify user ID.
    pub id: u64,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Email address.
    pub email: String,
    /// Whether the email address has been verified.
    pub email_verified: bool,
    /// Whether the user owns the store.
    pub account_owner: bool,
    /// Locale preference, e.g. `en`.
    pub locale: String,
    /// Whether the user is a collaborator account.
    pub collaborator: bool,
}

/// An authenticated session for one shop (and, when online, one user).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Storage key: `offline_{shop}` or `{shop}_{user_id}`.
    pub id: String,

    /// The shop this session belongs to.
    pub shop: ShopDomain,

    /// OAuth state used when the session was created, if any.
    #[serde(default)]
    pub state: String,

    /// Whether this is an online (user-specific) session.
    pub is_online: bool,

    /// Scopes granted to the access token.
    #[serde(default)]
    pub scopes: AuthScopes,

    /// Expiry of the access token, if it expires.
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,

    /// The Admin API access token.
    pub access_token: String,

    /// The staff member of an online session.
    #[serde(default)]
    pub associated_user: Option<AssociatedUser>,

    /// Scopes of the associated user, which may be narrower than `scopes`.
    #[serde(default)]
    pub associated_user_scopes: Option<AuthScopes>,
}

impl Session {
    /// Creates a new session with the specified parameters.
    #[must_use]
    pub const fn new(
        id: String,
        shop: ShopDomain,
        access_token: String,
        scopes: AuthScopes,
        is_online: bool,
        expires: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            shop,
            state: String::new(),
            is_online,
            scopes,
            expires,
            access_token,
            associated_user: None,
            associated_user_scopes: None,
        }
    }

    /// Returns the id of the offline session for `shop`.
    #[must_use]
    pub fn offline_id(shop: &ShopDomain) -> String {
        format!("offline_{}", shop.as_ref())
    }

    /// Returns the id of the online session for `shop` and `user_id`.
    #[must_use]
    pub fn online_id(shop: &ShopDomain, user_id: u64) -> String {
        format!("{}_{user_id}", shop.as_ref())
    }

    /// Returns `true` if this session has expired.
    ///
    /// Sessions without an expiry never expire.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.expires.is_some_and(|expires| Utc::now() > expires)
    }

    /// Returns `true` if the session can be used for requests needing `scopes`.
    ///
    /// The token must be present, unexpired, and granted every required scope.
    #[must_use]
    pub fn is_active(&self, scopes: &AuthScopes) -> bool {
        !self.access_token.is_empty() && !self.expired() && self.scopes.covers(scopes)
    }

    /// Builds a session from the token endpoint's response.
    ///
    /// Responses carrying an `associated_user` produce online sessions. An
    /// `expires_in` too large to represent leaves the session without expiry.
    #[must_use]
    pub fn from_access_token_response(shop: ShopDomain, response: &AccessTokenResponse) -> Self {
        let scopes: AuthScopes = response.scope.parse().unwrap_or_default();
        let expires = response.expires_in.and_then(|seconds| {
            let lifetime = Duration::try_seconds(i64::try_from(seconds).ok()?)?;
            Utc::now().checked_add_signed(lifetime)
        });

        match &response.associated_user {
            Some(user) => Self {
                id: Self::online_id(&shop, user.id),
                associated_user_scopes: response
                    .associated_user_scope
                    .as_deref()
                    .and_then(|scope| scope.parse().ok()),
                associated_user: Some(user.clone()),
                ..Self::new(
                    String::new(),
                    shop,
                    response.access_token.clone(),
                    scopes,
                    true,
                    expires,
                )
            },
            None => Self::new(
                Self::offline_id(&shop),
                shop,
                response.access_token.clone(),
                scopes,
                false,
                expires,
            ),
        }
    }
}

// Verify Session is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Session>();
    assert_send_sync::<AssociatedUser>();
};

/// Body returned by Shopify's `/admin/oauth/access_token` endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct AccessTokenResponse {
    /// The access token.
    pub access_token: String,
    /// Comma-separated granted scopes.
    #[serde(default)]
    pub scope: String,
    /// Seconds until the token expires (online and expiring offline tokens).
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Comma-separated scopes of the associated user.
    #[serde(default)]
    pub associated_user_scope: Option<String>,
    /// The staff member, present for online tokens.
    #[serde(default)]
    pub associated_user: Option<AssociatedUser>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shop() -> ShopDomain {
        ShopDomain::new("test-shop").unwrap()
    }

    fn sample_user() -> AssociatedUser {
        AssociatedUser {
            id: 902_541_635,
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: "jane@example.com".to_string(),
            email_verified: true,
            account_owner: true,
            locale: "en".to_string(),
            collaborator: false,
        }
    }

    #[test]
    fn test_session_ids() {
        assert_eq!(Session::offline_id(&shop()), "offline_test-shop.myshopify.com");
        assert_eq!(Session::online_id(&shop(), 42), "test-shop.myshopify.com_42");
    }

    #[test]
    fn test_session_expired() {
        let mut session = Session::new(
            "id".to_string(),
            shop(),
            "token".to_string(),
            AuthScopes::new(),
            true,
            Some(Utc::now() - Duration::hours(1)),
        );
        assert!(session.expired());

        session.expires = Some(Utc::now() + Duration::hours(1));
        assert!(!session.expired());

        session.expires = None;
        assert!(!session.expired());
    }

    #[test]
    fn test_session_is_active_checks_token_expiry_and_scopes() {
        let required: AuthScopes = "read_products".parse().unwrap();
        let mut session = Session::new(
            "id".to_string(),
            shop(),
            "token".to_string(),
            "write_products".parse().unwrap(),
            false,
            None,
        );
        assert!(session.is_active(&required));

        session.scopes = "read_orders".parse().unwrap();
        assert!(!session.is_active(&required));

        session.scopes = "read_products".parse().unwrap();
        session.access_token = String::new();
        assert!(!session.is_active(&required));
    }

    #[test]
    fn test_from_offline_token_response() {
        let response: AccessTokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "offline-token",
            "scope": "write_orders"
        }))
        .unwrap();

        let session = Session::from_access_token_response(shop(), &response);

        assert_eq!(session.id, "offline_test-shop.myshopify.com");
        assert!(!session.is_online);
        assert!(session.expires.is_none());
        assert!(session.scopes.has("read_orders"));
        assert!(session.associated_user.is_none());
    }

    #[test]
    fn test_from_online_token_response() {
        let response = AccessTokenResponse {
            access_token: "online-token".to_string(),
            scope: "read_products".to_string(),
            expires_in: Some(86_399),
            associated_user_scope: Some("read_products".to_string()),
            associated_user: Some(sample_user()),
        };

        let session = Session::from_access_token_response(shop(), &response);

        assert_eq!(session.id, "test-shop.myshopify.com_902541635");
        assert!(session.is_online);
        assert!(session.expires.is_some_and(|e| e > Utc::now()));
        assert_eq!(session.associated_user, Some(sample_user()));
        assert!(session
            .associated_user_scopes
            .as_ref()
            .is_some_and(|s| s.has("read_products")));
    }

    #[test]
    fn test_huge_expires_in_does_not_overflow() {
        for expires_in in [u64::MAX, i64::MAX.unsigned_abs(), 400_000 * 365 * 86_400] {
            let response = AccessTokenResponse {
                access_token: "online-token".to_string(),
                scope: "read_products".to_string(),
                expires_in: Some(expires_in),
                associated_user_scope: None,
                associated_user: Some(sample_user()),
            };

            let session = Session::from_access_token_response(shop(), &response);

            assert!(session.expires.is_none());
            assert!(!session.expired());
        }
    }

    #[test]
    fn test_session_serde_round_trip() {
        let mut session = Session::new(
            "test-shop.myshopify.com_1".to_string(),
            shop(),
            "token".to_string(),
            "read_products".parse().unwrap(),
            true,
            Some(Utc::now() + Duration::hours(1)),
        );
        session.state = "nonce".to_string();
        session.associated_user = Some(sample_user());

        let json = serde_json::to_string(&session).unwrap();
        let restored: Session = serde_json::from_str(&json).unwrap();

        assert_eq!(session, restored);
    }
}
