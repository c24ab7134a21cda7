//! In-memory session storage.

use super::{SessionStorage, SessionStorageError};
use crate::config::ShopDomain;
use crate::session::Session;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Session storage held in process memory.
///
/// Sessions are lost when the process exits, so this storage suits
/// development, tests and single-instance apps that can afford a reinstall
/// round trip after a restart. Cloning shares the underlying map.
#[derive(Clone, Debug, Default)]
pub struct MemorySessionStorage {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl MemorySessionStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns `true` if no sessions are stored.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn store_session(&self, session: &Session) -> Result<(), SessionStorageError> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn load_session(&self, id: &str) -> Result<Option<Session>, SessionStorageError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn delete_session(&self, id: &str) -> Result<(), SessionStorageError> {
        self.sessions.write().await.remove(id);
        Ok(())
    }

    async fn delete_sessions(&self, ids: &[String]) -> Result<(), SessionStorageError> {
        let mut sessions = self.sessions.write().await;
        for id in ids {
            sessions.remove(id);
        }
        Ok(())
    }

    async fn find_sessions_by_shop(
        &self,
        shop: &ShopDomain,
    ) -> Result<Vec<Session>, SessionStorageError> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .filter(|session| &session.shop == shop)
            .cloned()
            .collect())
    }
}
