//! MongoDB session storage.

use super::{SessionStorage, SessionStorageError};
use crate::config::ShopDomain;
use crate::session::Session;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};

/// Session storage backed by a MongoDB collection.
///
/// Each session is one document, keyed by a unique index on its `id`
/// field. A second index on `shop` backs
/// [`find_sessions_by_shop`](SessionStorage::find_sessions_by_shop).
/// Connection pooling is handled by the driver; driver errors are returned
/// unchanged as [`SessionStorageError::MongoDb`].
///
/// # Example
///
/// ```rust,ignore
/// use shopify_app::{AppConfig, MongoDbSessionStorage, ShopifyApp};
///
/// let storage = MongoDbSessionStorage::connect("mongodb://localhost:27017", "my_app").await?;
/// let app = ShopifyApp::with_session_storage(AppConfig::from_env()?, storage);
/// ```
#[derive(Clone, Debug)]
pub struct MongoDbSessionStorage {
    collection: Collection<Session>,
}

impl MongoDbSessionStorage {
    /// Collection used when none is given.
    pub const DEFAULT_COLLECTION: &'static str = "shopify_sessions";

    /// Connects to `url` and stores sessions in `db_name.shopify_sessions`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStorageError::MongoDb`] if the URL is invalid or the
    /// indexes cannot be created.
    pub async fn connect(url: &str, db_name: &str) -> Result<Self, SessionStorageError> {
        Self::connect_with_collection(url, db_name, Self::DEFAULT_COLLECTION).await
    }

    /// Connects to `url` and stores sessions in `db_name.collection_name`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStorageError::MongoDb`] if the URL is invalid or the
    /// indexes cannot be created.
    pub async fn connect_with_collection(
        url: &str,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, SessionStorageError> {
        let client = Client::with_uri_str(url).await?;
        let collection = client.database(db_name).collection(collection_name);
        Self::from_collection(collection).await
    }

    /// Uses an existing collection handle, creating the indexes if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStorageError::MongoDb`] if the indexes cannot be created.
    pub async fn from_collection(
        collection: Collection<Session>,
    ) -> Result<Self, SessionStorageError> {
        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let shop_index = IndexModel::builder().keys(doc! { "shop": 1 }).build();

        collection.create_index(id_index).await?;
        collection.create_index(shop_index).await?;

        tracing::debug!(
            collection = %collection.name(),
            "MongoDB session storage ready"
        );

        Ok(Self { collection })
    }

    /// Returns the underlying collection.
    #[must_use]
    pub const fn collection(&self) -> &Collection<Session> {
        &self.collection
    }
}

#[async_trait]
impl SessionStorage for MongoDbSessionStorage {
    async fn store_session(&self, session: &Session) -> Result<(), SessionStorageError> {
        self.collection
            .replace_one(doc! { "id": &session.id }, session)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn load_session(&self, id: &str) -> Result<Option<Session>, SessionStorageError> {
        Ok(self.collection.find_one(doc! { "id": id }).await?)
    }

    async fn delete_session(&self, id: &str) -> Result<(), SessionStorageError> {
        self.collection.delete_one(doc! { "id": id }).await?;
        Ok(())
    }

    async fn delete_sessions(&self, ids: &[String]) -> Result<(), SessionStorageError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.collection
            .delete_many(doc! { "id": { "$in": ids.to_vec() } })
            .await?;
        Ok(())
    }

    async fn find_sessions_by_shop(
        &self,
        shop: &ShopDomain,
    ) -> Result<Vec<Session>, SessionStorageError> {
        let cursor = self.collection.find(doc! { "shop": shop.as_ref() }).await?;
        Ok(cursor.try_collect().await?)
    }
}
