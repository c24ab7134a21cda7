//! Webhook error types.

use crate::clients::AdminApiError;
use thiserror::Error;

/// Errors from webhook registration and verification.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The GraphQL request failed.
    #[error(transparent)]
    AdminApi(#[from] AdminApiError),

    /// The mutation ran but Shopify returned `userErrors`.
    #[error("Shopify API error: {message}")]
    ShopifyError {
        /// Joined `userErrors` messages.
        message: String,
    },

    /// The response did not have the expected shape.
    #[error("Unexpected webhook subscription response: {message}")]
    UnexpectedResponse {
        /// What was missing.
        message: String,
    },

    /// A required webhook header is missing.
    #[error("Missing webhook header: {header}")]
    MissingHeader {
        /// Name of the header.
        header: &'static str,
    },

    /// A webhook header has an invalid value.
    #[error("Invalid value for webhook header {header}")]
    InvalidHeader {
        /// Name of the header.
        header: &'static str,
    },

    /// Signature verification failed.
    #[error("Webhook signature verification failed")]
    InvalidHmac,
}

// Verify WebhookError is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<WebhookError>();
};
