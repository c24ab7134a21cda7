//! Outbound calls to the Shopify Admin API.
//!
//! [`AdminApiClient`] is handed to route handlers inside every
//! authentication context, already bound to the request's session.

mod admin;
mod errors;

pub use admin::{AdminApiClient, DEFAULT_TRIES, RETRY_WAIT_TIME};
pub use errors::AdminApiError;

use crate::config::AppConfig;

/// Version of this crate, sent in the `User-Agent` header.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Builds the `User-Agent` sent with every outbound request.
pub(crate) fn user_agent(config: &AppConfig) -> String {
    let prefix = config
        .user_agent_prefix()
        .map_or(String::new(), |prefix| format!("{prefix} | "));
    let rust_version = env!("CARGO_PKG_RUST_VERSION");
    format!("{prefix}Shopify App Library v{SDK_VERSION} | Rust {rust_version}")
}
