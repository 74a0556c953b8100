//! A dependent cache scoped to the active identity.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

use crate::dependents::DependentCache;
use crate::model::{UserId, UserProfile};
use crate::store::{IdentityStorage, StorageError};

/// A value owned by one identity at a time.
///
/// The value is held in memory and, when backed by [`IdentityStorage`],
/// persisted under `namespace` for its owner. Register it with the
/// [`DependentStateCoordinator`](crate::DependentStateCoordinator) so a user
/// switch empties it before the new identity becomes visible, then restores
/// whatever the new identity persisted.
///
/// # Example
///
/// ```rust,no_run
/// use gatehouse_core::{DependentStateCoordinator, ScopedCache};
/// use std::sync::Arc;
///
/// let coordinator = DependentStateCoordinator::new();
/// let history: Arc<ScopedCache<Vec<String>>> = Arc::new(ScopedCache::in_memory("chat"));
/// coordinator.register(history.clone());
/// ```
pub struct ScopedCache<T> {
    namespace: String,
    storage: Option<Arc<dyn IdentityStorage>>,
    slot: RwLock<Slot<T>>,
}

struct Slot<T> {
    owner: Option<UserId>,
    /// Bumped on every reset and reload.
    epoch: u64,
    value: T,
}

impl<T> ScopedCache<T>
where
    T: Default + Clone + Serialize + DeserializeOwned + Send + Sync,
{
    /// A cache that is lost on reset.
    pub fn in_memory(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            storage: None,
            slot: RwLock::new(Slot {
                owner: None,
                epoch: 0,
                value: T::default(),
            }),
        }
    }

    /// A cache persisted per identity.
    pub fn persistent(namespace: impl Into<String>, storage: Arc<dyn IdentityStorage>) -> Self {
        Self {
            storage: Some(storage),
            ..Self::in_memory(namespace)
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Identity the current value belongs to.
    pub fn owner(&self) -> Option<UserId> {
        self.slot.read().owner.clone()
    }

    pub fn get(&self) -> T {
        self.slot.read().value.clone()
    }

    /// Borrow the value without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.slot.read().value)
    }

    /// Modify the value and persist it for the current owner.
    ///
    /// Without an owner the change stays in memory only. If the owner leaves
    /// the session while the write is in flight, the write is undone so the
    /// departed identity's storage stays cleared.
    pub async fn update(&self, f: impl FnOnce(&mut T)) -> Result<(), StorageError> {
        let (owner, epoch, value) = {
            let mut slot = self.slot.write();
            f(&mut slot.value);
            (slot.owner.clone(), slot.epoch, slot.value.clone())
        };

        let (Some(owner), Some(storage)) = (owner, &self.storage) else {
            return Ok(());
        };

        let json = serde_json::to_value(&value)?;
        storage.save(&owner, &self.namespace, &json).await?;

        if self.slot.read().epoch != epoch {
            debug!(cache = %self.namespace, identity = %owner, "owner left during write, undoing it");
            storage.remove(&owner, &self.namespace).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<T> DependentCache for ScopedCache<T>
where
    T: Default + Clone + Serialize + DeserializeOwned + Send + Sync,
{
    fn name(&self) -> &str {
        &self.namespace
    }

    async fn reset(&self) {
        let mut slot = self.slot.write();
        slot.owner = None;
        slot.epoch = slot.epoch.wrapping_add(1);
        slot.value = T::default();
    }

    async fn reload(&self, profile: &UserProfile) -> Result<(), StorageError> {
        let stored = match &self.storage {
            Some(storage) => storage.load(&profile.id, &self.namespace).await?,
            None => None,
        };

        let value = match stored {
            Some(json) => serde_json::from_value(json)?,
            None => T::default(),
        };

        debug!(cache = %self.namespace, identity = %profile.id, "scoped cache restored");
        let mut slot = self.slot.write();
        slot.owner = Some(profile.id.clone());
        slot.epoch = slot.epoch.wrapping_add(1);
        slot.value = value;
        Ok(())
    }
}

impl<T> std::fmt::Debug for ScopedCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedCache")
            .field("namespace", &self.namespace)
            .field("owner", &self.slot.read().owner)
            .field("durable", &self.storage.is_some())
            .finish()
    }
}
