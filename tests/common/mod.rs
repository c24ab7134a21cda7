//! Shared behavior checks run against every `SessionStorage` implementation.

#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use shopify_app::{AssociatedUser, AuthScopes, Session, SessionStorage, ShopDomain};
use std::sync::Arc;

pub fn shop(name: &str) -> ShopDomain {
    ShopDomain::new(name).unwrap()
}

pub fn offline_session(shop_name: &str, token: &str) -> Session {
    let shop = shop(shop_name);
    Session::new(
        Session::offline_id(&shop),
        shop,
        token.to_string(),
        "read_products,write_orders".parse::<AuthScopes>().unwrap(),
        false,
        None,
    )
}

pub fn online_session(shop_name: &str, user_id: u64, token: &str) -> Session {
    let shop = shop(shop_name);
    Session::new(
        Session::online_id(&shop, user_id),
        shop,
        token.to_string(),
        "read_products".parse::<AuthScopes>().unwrap(),
        true,
        Some(Utc::now() + Duration::hours(1)),
    )
}

pub async fn stores_and_loads(storage: &dyn SessionStorage) {
    let mut session = online_session("store-and-load", 902_541_635, "online-token");
    session.state = "state-nonce".to_string();
    session.expires = Some(Utc.with_ymd_and_hms(2031, 5, 17, 8, 30, 15).unwrap());
    session.associated_user_scopes = Some("read_products".parse().unwrap());
    session.associated_user = Some(AssociatedUser {
        id: 902_541_635,
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
        email: "jane@example.com".to_string(),
        email_verified: true,
        account_owner: false,
        locale: "en-CA".to_string(),
        collaborator: true,
    });

    storage.store_session(&session).await.unwrap();
    let loaded = storage.load_session(&session.id).await.unwrap().unwrap();

    assert_eq!(loaded, session);
}

pub async fn missing_session_is_none(storage: &dyn SessionStorage) {
    assert!(storage
        .load_session("offline_never-stored.myshopify.com")
        .await
        .unwrap()
        .is_none());
}

pub async fn store_replaces_existing(storage: &dyn SessionStorage) {
    storage
        .store_session(&offline_session("upsert", "first"))
        .await
        .unwrap();
    storage
        .store_session(&offline_session("upsert", "second"))
        .await
        .unwrap();

    let sessions = storage.find_sessions_by_shop(&shop("upsert")).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].access_token, "second");
}

pub async fn deletes_session(storage: &dyn SessionStorage) {
    let session = offline_session("delete-one", "token");
    storage.store_session(&session).await.unwrap();

    storage.delete_session(&session.id).await.unwrap();

    assert!(storage.load_session(&session.id).await.unwrap().is_none());
    // Deleting again is not an error.
    storage.delete_session(&session.id).await.unwrap();
}

pub async fn deletes_sessions_in_bulk(storage: &dyn SessionStorage) {
    let first = online_session("delete-many", 1, "a");
    let second = online_session("delete-many", 2, "b");
    let kept = offline_session("delete-many", "c");
    for session in [&first, &second, &kept] {
        storage.store_session(session).await.unwrap();
    }

    storage
        .delete_sessions(&[first.id.clone(), second.id.clone()])
        .await
        .unwrap();

    assert!(storage.load_session(&first.id).await.unwrap().is_none());
    assert!(storage.load_session(&second.id).await.unwrap().is_none());
    assert!(storage.load_session(&kept.id).await.unwrap().is_some());
}

pub async fn finds_sessions_by_shop(storage: &dyn SessionStorage) {
    storage
        .store_session(&offline_session("find-by-shop", "offline"))
        .await
        .unwrap();
    storage
        .store_session(&online_session("find-by-shop", 7, "online"))
        .await
        .unwrap();
    storage
        .store_session(&offline_session("another-shop", "other"))
        .await
        .unwrap();

    let mut tokens: Vec<String> = storage
        .find_sessions_by_shop(&shop("find-by-shop"))
        .await
        .unwrap()
        .into_iter()
        .map(|session| session.access_token)
        .collect();
    tokens.sort();

    assert_eq!(tokens, vec!["offline", "online"]);
    assert!(storage
        .find_sessions_by_shop(&shop("no-sessions-here"))
        .await
        .unwrap()
        .is_empty());
}

/// Concurrent writers to the same id leave exactly one of the written values.
pub async fn concurrent_stores_keep_one_value(storage: Arc<dyn SessionStorage>) {
    let tokens: Vec<String> = (0..16).map(|i| format!("token-{i}")).collect();

    let handles: Vec<_> = tokens
        .iter()
        .cloned()
        .map(|token| {
            let storage = Arc::clone(&storage);
            tokio::spawn(async move {
                storage
                    .store_session(&offline_session("concurrent", &token))
                    .await
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let sessions = storage
        .find_sessions_by_shop(&shop("concurrent"))
        .await
        .unwrap();
    assert_eq!(sessions.len(), 1);
    assert!(tokens.contains(&sessions[0].access_token));
}
