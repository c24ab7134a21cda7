//! Error types for request authentication.
//!
//! Two layers of errors exist:
//!
//! - [`OAuthError`]: a failure talking to Shopify or validating what it sent
//!   (HMAC, state, session tokens, token endpoint responses)
//! - [`AuthenticateError`]: what the `authenticate` operations return. Its
//!   [`Response`](AuthenticateError::Response) variant is not a fault: it
//!   carries the redirect, 401 or 400 response the app must send back
//!   instead of running its handler.
//!
//! # Example
//!
//! ```rust
//! use shopify_app::auth::OAuthError;
//!
//! let error = OAuthError::StateMismatch;
//! assert_eq!(error.to_string(), "OAuth state parameter did not match the state cookie");
//! ```

use crate::auth::AppResponse;
use crate::session_storage::SessionStorageError;
use http::StatusCode;
use thiserror::Error;

/// Errors that can occur while validating Shopify credentials or obtaining
/// access tokens.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// HMAC signature validation failed.
    #[error("HMAC signature validation failed")]
    InvalidHmac,

    /// The OAuth state parameter did not match the state cookie.
    #[error("OAuth state parameter did not match the state cookie")]
    StateMismatch,

    /// The callback request is missing parameters or has malformed values.
    #[error("Invalid callback: {reason}")]
    InvalidCallback {
        /// Description of what is invalid.
        reason: String,
    },

    /// A session token (JWT) failed validation.
    #[error("Invalid session token: {reason}")]
    InvalidSessionToken {
        /// Description of why validation failed.
        reason: String,
    },

    /// The token endpoint returned a non-success status.
    #[error("Token request failed with status {status}: {message}")]
    TokenRequestFailed {
        /// The HTTP status code returned (0 for network failures).
        status: u16,
        /// The error message or response body.
        message: String,
    },

    /// A network error occurred while calling Shopify.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

// Verify OAuthError is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<OAuthError>();
};

/// The outcome of an `authenticate` operation that did not produce a context.
///
/// Framework integrations usually turn every variant into a response with
/// [`into_response`](Self::into_response) and return it from the route.
#[derive(Debug, Error)]
pub enum AuthenticateError {
    /// The request must be answered with this response (redirect, 401, 400,
    /// 405 ...).
    #[error("request answered with status {}", .0.status())]
    Response(Box<AppResponse>),

    /// The session storage failed.
    #[error(transparent)]
    SessionStorage(#[from] SessionStorageError),

    /// Talking to Shopify failed.
    #[error(transparent)]
    OAuth(#[from] OAuthError),

    /// The `after_auth` hook returned an error.
    #[error("after_auth hook failed: {0}")]
    Hook(#[source] crate::app::HookError),

    /// Login is not available for apps created in the Shopify admin.
    #[error("login is not supported for apps distributed through the Shopify admin")]
    LoginUnavailable,
}

impl AuthenticateError {
    /// Wraps a response the app should send back.
    #[must_use]
    pub fn response(response: AppResponse) -> Self {
        Self::Response(Box::new(response))
    }

    /// Returns the response to send back to the client.
    ///
    /// Failures other than [`Response`](Self::Response) become an empty
    /// `500 Internal Server Error`.
    #[must_use]
    pub fn into_response(self) -> AppResponse {
        match self {
            Self::Response(response) => *response,
            other => {
                tracing::error!(error = %other, "Authentication failed unexpectedly");
                let mut response = AppResponse::new(String::new());
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response
            }
        }
    }

    /// Returns the carried response, if any.
    #[must_use]
    pub fn as_response(&self) -> Option<&AppResponse> {
        match self {
            Self::Response(response) => Some(response),
            _ => None,
        }
    }
}

// Verify AuthenticateError is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AuthenticateError>();
};
