//! Identity isolation for caches owned by other subsystems.
//!
//! The [`DependentStateCoordinator`] is the only consumer of [`AuthEvent`]s
//! inside the core. Feature modules register a [`DependentCache`] with it
//! instead of depending on the session module directly.
//!
//! On every identity change the coordinator, in order:
//! 1. resets every registered cache to its empty state,
//! 2. clears the durable storage of the previous identity,
//! 3. reloads every cache for the incoming identity (login and switch only).
//!
//! The session context awaits all three steps before the transition returns
//! and before the new snapshot is published.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::events::AuthEvent;
use crate::model::{UserId, UserProfile};
use crate::store::{IdentityStorage, StorageError};

/// State owned by a feature module that must not cross a session boundary.
#[async_trait]
pub trait DependentCache: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Return to the empty state.
    async fn reset(&self);

    /// Load the persisted data of a newly active identity.
    ///
    /// Called only after [`reset`](DependentCache::reset).
    async fn reload(&self, profile: &UserProfile) -> Result<(), StorageError> {
        let _ = profile;
        Ok(())
    }
}

/// Fans identity changes out to registered caches.
///
/// Cloning shares the registry.
#[derive(Clone, Default)]
pub struct DependentStateCoordinator {
    inner: Arc<CoordinatorInner>,
}

#[derive(Default)]
struct CoordinatorInner {
    caches: RwLock<Vec<Arc<dyn DependentCache>>>,
    storage: Option<Arc<dyn IdentityStorage>>,
    active: Mutex<Option<UserId>>,
}

impl DependentStateCoordinator {
    /// Create a coordinator without durable storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a coordinator that also wipes durable per-identity storage.
    pub fn with_storage(storage: Arc<dyn IdentityStorage>) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                storage: Some(storage),
                ..CoordinatorInner::default()
            }),
        }
    }

    /// Register a cache. Registration order is reset and reload order.
    pub fn register(&self, cache: Arc<dyn DependentCache>) {
        debug!(cache = cache.name(), "registered dependent cache");
        self.inner.caches.write().push(cache);
    }

    pub fn cache_count(&self) -> usize {
        self.inner.caches.read().len()
    }

    /// Identity whose data the caches currently hold.
    pub fn active_identity(&self) -> Option<UserId> {
        self.inner.active.lock().clone()
    }

    pub fn storage(&self) -> Option<Arc<dyn IdentityStorage>> {
        self.inner.storage.clone()
    }

    /// Apply an event. Completes only after every reset and reload finished.
    pub(crate) async fn handle(&self, event: &AuthEvent) {
        let previous = self.active_identity();
        let incoming = event.incoming_profile();

        if previous.as_ref() == incoming.map(|p| &p.id) {
            debug!(event = event.name(), "identity unchanged, dependent caches kept");
            return;
        }

        // Snapshot so registration during an await cannot deadlock.
        let caches: Vec<Arc<dyn DependentCache>> = self.inner.caches.read().clone();

        for cache in &caches {
            cache.reset().await;
            debug!(cache = cache.name(), "dependent cache reset");
        }

        if let (Some(previous), Some(storage)) = (&previous, &self.inner.storage) {
            if let Err(e) = storage.clear_identity(previous).await {
                warn!(identity = %previous, error = %e, "failed to clear identity storage");
            }
        }

        *self.inner.active.lock() = incoming.map(|p| p.id.clone());

        info!(
            event = event.name(),
            from = previous.as_ref().map(|id| id.as_str()).unwrap_or("-"),
            to = incoming.map(|p| p.id.as_str()).unwrap_or("-"),
            caches = caches.len(),
            "dependent caches reset for identity change"
        );

        if let Some(profile) = incoming {
            for cache in &caches {
                if let Err(e) = cache.reload(profile).await {
                    warn!(cache = cache.name(), identity = %profile.id, error = %e, "dependent cache reload failed");
                }
            }
        }
    }

    /// Forget the active identity without touching caches or storage.
    pub(crate) fn forget(&self) {
        self.inner.active.lock().take();
    }
}

impl std::fmt::Debug for DependentStateCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependentStateCoordinator")
            .field("caches", &self.cache_count())
            .field("active", &self.active_identity())
            .field("durable", &self.inner.storage.is_some())
            .finish()
    }
}
