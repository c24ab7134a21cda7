//! Error types for Admin API calls.

use thiserror::Error;

/// Errors returned by [`AdminApiClient`](crate::AdminApiClient).
#[derive(Debug, Error)]
pub enum AdminApiError {
    /// Shopify answered with a non-success status.
    #[error("Admin API request failed with status {status}: {message}")]
    Response {
        /// HTTP status code.
        status: u16,
        /// Serialized error body.
        message: String,
        /// The `X-Request-Id` of the failed request, if any.
        request_id: Option<String>,
    },

    /// Every attempt was throttled or failed with a server error.
    #[error("Exceeded maximum retry count of {tries}. Last message: {message}")]
    MaxRetries {
        /// Status of the last attempt.
        status: u16,
        /// Number of attempts made.
        tries: u32,
        /// Serialized error body of the last attempt.
        message: String,
    },

    /// The query was executed but Shopify reported GraphQL errors.
    #[error("GraphQL query returned errors: {0}")]
    Graphql(serde_json::Value),

    /// The request could not be sent or the response could not be read.
    #[error(transparent)]
    Network(#[from] reqwest::Error),
}

impl AdminApiError {
    /// Returns `true` if Shopify rejected the access token.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Response { status: 401, .. })
    }
}

// Verify AdminApiError is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AdminApiError>();
};
