//! Session persistence.
//!
//! [`SessionStorage`] is the seam between request authentication and
//! whatever database the app uses. Two implementations ship with the crate:
//!
//! - [`MemorySessionStorage`]: process-local, the default for
//!   [`ShopifyApp::new`](crate::ShopifyApp::new) and for tests
//! - [`MongoDbSessionStorage`]: backed by a MongoDB collection (requires the
//!   `mongodb` feature)
//!
//! Every operation is keyed by the session id (`offline_{shop}` or
//! `{shop}_{user_id}`). Storing a session with an existing id replaces it.
//!
//! # Example
//!
//! ```rust
//! use shopify_app::{MemorySessionStorage, Session, SessionStorage, ShopDomain};
//!
//! # tokio_test::block_on(async {
//! let storage = MemorySessionStorage::new();
//! let shop = ShopDomain::new("my-store").unwrap();
//! let session = Session::new(
//!     Session::offline_id(&shop),
//!     shop,
//!     "token".to_string(),
//!     Default::default(),
//!     false,
//!     None,
//! );
//!
//! storage.store_session(&session).await.unwrap();
//! let loaded = storage.load_session(&session.id).await.unwrap();
//! assert_eq!(loaded, Some(session));
//! # });
//! ```

mod memory;
#[cfg(feature = "mongodb")]
mod mongo;

pub use memory::MemorySessionStorage;
#[cfg(feature = "mongodb")]
pub use mongo::MongoDbSessionStorage;

use crate::config::ShopDomain;
use crate::session::Session;
use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by [`SessionStorage`] implementations.
#[derive(Debug, Error)]
pub enum SessionStorageError {
    /// A session could not be converted to or from its stored form.
    #[error("Failed to serialize session: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The storage backend reported a failure.
    #[error("Session storage backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },

    /// The MongoDB driver reported a failure.
    #[cfg(feature = "mongodb")]
    #[error(transparent)]
    MongoDb(#[from] mongodb::error::Error),
}

// Verify SessionStorageError is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SessionStorageError>();
};

/// Persists [`Session`]s by id.
///
/// Implementations must be safe to share between concurrent requests.
/// Failures of the underlying store are returned as-is; no operation retries.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Inserts the session, replacing any stored session with the same id.
    async fn store_session(&self, session: &Session) -> Result<(), SessionStorageError>;

    /// Returns the session with `id`, or `None` when nothing is stored.
    async fn load_session(&self, id: &str) -> Result<Option<Session>, SessionStorageError>;

    /// Removes the session with `id`. Deleting a missing id is not an error.
    async fn delete_session(&self, id: &str) -> Result<(), SessionStorageError>;

    /// Removes every session whose id is in `ids`.
    async fn delete_sessions(&self, ids: &[String]) -> Result<(), SessionStorageError>;

    /// Returns all sessions stored for `shop`, online and offline.
    async fn find_sessions_by_shop(
        &self,
        shop: &ShopDomain,
    ) -> Result<Vec<Session>, SessionStorageError>;
}
