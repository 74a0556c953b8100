//! Integration tests for identity isolation of dependent caches.
//!
//! These tests verify that:
//! - A user switch never exposes data written under the previous identity
//! - Durable storage of the previous identity is wiped
//! - Caches are reset before a transition returns or is observable
//! - Logout resets without reloading

mod common;

use async_trait::async_trait;
use common::{ScriptedBoundary, anna, boris};
use gatehouse_core::{
    AuthEvent, DependentCache, DependentStateCoordinator, IdentityStorage, LoginCredentials,
    MemoryIdentityStorage, ScopedCache, SessionContext, SessionManager, StorageError, UserProfile,
};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Cache whose reload is slow and records what it saw when reload began.
#[derive(Default)]
struct SlowReload {
    entries: Mutex<Vec<String>>,
    seen_at_reload: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl DependentCache for SlowReload {
    fn name(&self) -> &str {
        "slow"
    }

    async fn reset(&self) {
        self.entries.lock().clear();
    }

    async fn reload(&self, profile: &UserProfile) -> Result<(), StorageError> {
        let seen = self.entries.lock().clone();
        self.seen_at_reload.lock().push(seen);
        tokio::time::sleep(Duration::from_millis(300)).await;
        self.entries.lock().push(format!("restored:{}", profile.id));
        Ok(())
    }
}

struct Fixture {
    session: SessionManager,
    storage: Arc<MemoryIdentityStorage>,
    chat: Arc<ScopedCache<Vec<String>>>,
}

/// Helper to wire a session with a persistent chat cache.
fn fixture(boundary: ScriptedBoundary, extra: Option<Arc<dyn DependentCache>>) -> Fixture {
    let storage = Arc::new(MemoryIdentityStorage::new());
    let coordinator = DependentStateCoordinator::with_storage(storage.clone());
    let chat = Arc::new(ScopedCache::persistent("chat", storage.clone()));
    coordinator.register(chat.clone());
    if let Some(extra) = extra {
        coordinator.register(extra);
    }

    let session = SessionManager::new(Arc::new(boundary), SessionContext::new(coordinator));
    Fixture {
        session,
        storage,
        chat,
    }
}

#[tokio::test]
async fn test_switch_hides_previous_identity_data() {
    let f = fixture(
        ScriptedBoundary::new()
            .grant_login(anna())
            .grant_login(boris()),
        None,
    );
    f.storage
        .save(&boris().id, "chat", &json!(["boris: hello"]))
        .await
        .unwrap();

    f.session
        .login(&LoginCredentials::new("anna@example.com", "pw"))
        .await
        .unwrap();
    f.chat
        .update(|messages| messages.push("anna: my balance".to_string()))
        .await
        .unwrap();
    f.session
        .login(&LoginCredentials::new("boris@example.com", "pw"))
        .await
        .unwrap();

    assert_eq!(f.chat.get(), vec!["boris: hello".to_string()]);
    assert_eq!(f.chat.owner(), Some(boris().id));
    assert!(f.storage.load(&anna().id, "chat").await.unwrap().is_none());
}

#[tokio::test]
async fn test_logout_resets_without_reload() {
    let f = fixture(ScriptedBoundary::new().grant_login(anna()), None);
    f.session
        .login(&LoginCredentials::new("anna@example.com", "pw"))
        .await
        .unwrap();
    f.chat
        .update(|messages| messages.push("anna: hi".to_string()))
        .await
        .unwrap();

    f.session.logout().await;

    assert!(f.chat.get().is_empty());
    assert!(f.chat.owner().is_none());
    assert!(f.storage.namespaces(&anna().id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_relogin_same_identity_restores_nothing_stale() {
    let f = fixture(
        ScriptedBoundary::new()
            .grant_login(anna())
            .grant_login(anna()),
        None,
    );
    f.session
        .login(&LoginCredentials::new("anna@example.com", "pw"))
        .await
        .unwrap();
    f.chat
        .update(|messages| messages.push("draft".to_string()))
        .await
        .unwrap();

    // Same identity: no event, cache untouched.
    f.session
        .login(&LoginCredentials::new("anna@example.com", "pw"))
        .await
        .unwrap();

    assert_eq!(f.chat.get(), vec!["draft".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_reset_completes_before_transition_returns() {
    let slow = Arc::new(SlowReload::default());
    let f = fixture(
        ScriptedBoundary::new()
            .grant_login(anna())
            .grant_login(boris()),
        Some(slow.clone() as Arc<dyn DependentCache>),
    );

    f.session
        .login(&LoginCredentials::new("anna@example.com", "pw"))
        .await
        .unwrap();
    assert_eq!(*slow.entries.lock(), vec!["restored:1".to_string()]);

    f.session
        .login(&LoginCredentials::new("boris@example.com", "pw"))
        .await
        .unwrap();

    assert_eq!(*slow.seen_at_reload.lock(), vec![Vec::<String>::new(), Vec::new()]);
    assert_eq!(*slow.entries.lock(), vec!["restored:2".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_observers_never_see_stale_cache() {
    let slow = Arc::new(SlowReload::default());
    let f = fixture(
        ScriptedBoundary::new()
            .grant_login(anna())
            .grant_login(boris()),
        Some(slow.clone() as Arc<dyn DependentCache>),
    );
    f.session
        .login(&LoginCredentials::new("anna@example.com", "pw"))
        .await
        .unwrap();
    f.chat
        .update(|messages| messages.push("anna: secret".to_string()))
        .await
        .unwrap();

    let mut events = f.session.subscribe_events();
    let mut signals = f.session.subscribe_signals();
    let chat = f.chat.clone();
    let observer = tokio::spawn(async move {
        let event = events.recv().await.unwrap();
        let at_event = chat.get();
        signals
            .wait_for(|s| s.identity() == Some(&boris().id))
            .await
            .unwrap();
        (event, at_event, chat.get())
    });

    let switching = f.session.clone();
    let login = tokio::spawn(async move {
        switching
            .login(&LoginCredentials::new("boris@example.com", "pw"))
            .await
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    // Reload is still sleeping; nothing has been published yet.
    assert!(!login.is_finished());
    assert_eq!(f.session.current_profile().map(|p| p.id), Some(anna().id));

    login.await.unwrap().unwrap();
    let (event, at_event, at_signal) = observer.await.unwrap();

    assert!(matches!(event, AuthEvent::UserSwitched { .. }));
    assert!(at_event.is_empty());
    assert!(at_signal.is_empty());
}
