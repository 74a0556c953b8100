//! Durable per-identity storage.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

use crate::model::UserId;

/// Error type for identity storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    BackendError { message: String },

    /// I/O error reading or writing stored data.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// No platform data directory could be determined.
    #[error("data directory not available")]
    DataDirUnavailable,
}

/// Durable storage for data that belongs to a single user identity.
///
/// Every value lives under an `(identity, namespace)` pair. Dependent caches
/// persist into their own namespace; the dependent-state coordinator wipes an
/// identity's namespaces when that identity leaves the session.
#[async_trait]
pub trait IdentityStorage: Send + Sync {
    /// Load a value.
    ///
    /// Returns `Ok(None)` if nothing was stored.
    async fn load(&self, identity: &UserId, namespace: &str) -> Result<Option<Value>, StorageError>;

    /// Store a value, overwriting any existing one.
    async fn save(&self, identity: &UserId, namespace: &str, value: &Value) -> Result<(), StorageError>;

    /// Remove one namespace of an identity.
    ///
    /// Returns `Ok(())` even if nothing was stored.
    async fn remove(&self, identity: &UserId, namespace: &str) -> Result<(), StorageError>;

    /// Remove every namespace stored for an identity.
    ///
    /// Returns `Ok(())` even if nothing was stored.
    async fn clear_identity(&self, identity: &UserId) -> Result<(), StorageError>;

    /// List the namespaces stored for an identity.
    async fn namespaces(&self, identity: &UserId) -> Result<Vec<String>, StorageError>;
}

/// In-memory identity storage for testing and ephemeral sessions.
///
/// Data is lost when the process exits.
pub struct MemoryIdentityStorage {
    data: RwLock<HashMap<UserId, HashMap<String, Value>>>,
}

impl MemoryIdentityStorage {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryIdentityStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryIdentityStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.data.read().map(|d| d.len()).unwrap_or(0);
        f.debug_struct("MemoryIdentityStorage")
            .field("identities", &count)
            .finish()
    }
}

fn poisoned(e: impl std::fmt::Display) -> StorageError {
    StorageError::BackendError {
        message: format!("lock poisoned: {}", e),
    }
}

#[async_trait]
impl IdentityStorage for MemoryIdentityStorage {
    async fn load(&self, identity: &UserId, namespace: &str) -> Result<Option<Value>, StorageError> {
        let data = self.data.read().map_err(poisoned)?;
        Ok(data.get(identity).and_then(|ns| ns.get(namespace)).cloned())
    }

    async fn save(&self, identity: &UserId, namespace: &str, value: &Value) -> Result<(), StorageError> {
        let mut data = self.data.write().map_err(poisoned)?;
        data.entry(identity.clone())
            .or_default()
            .insert(namespace.to_string(), value.clone());
        Ok(())
    }

    async fn remove(&self, identity: &UserId, namespace: &str) -> Result<(), StorageError> {
        let mut data = self.data.write().map_err(poisoned)?;
        if let Some(namespaces) = data.get_mut(identity) {
            namespaces.remove(namespace);
            if namespaces.is_empty() {
                data.remove(identity);
            }
        }
        Ok(())
    }

    async fn clear_identity(&self, identity: &UserId) -> Result<(), StorageError> {
        let mut data = self.data.write().map_err(poisoned)?;
        data.remove(identity);
        Ok(())
    }

    async fn namespaces(&self, identity: &UserId) -> Result<Vec<String>, StorageError> {
        let data = self.data.read().map_err(poisoned)?;
        let mut names: Vec<String> = data
            .get(identity)
            .map(|ns| ns.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        Ok(names)
    }
}
