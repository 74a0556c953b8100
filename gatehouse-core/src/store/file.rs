//! File-backed identity storage.
//!
//! Each identity gets its own directory under the storage root, and each
//! namespace is a pretty-printed JSON file inside it:
//!
//! ```text
//! {root}/{identity}/{namespace}.json
//! ```
//!
//! The default root is the platform data directory, e.g.
//! `~/.local/share/gatehouse/identities` on Linux.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{IdentityStorage, StorageError};
use crate::model::UserId;

/// Disk-backed [`IdentityStorage`].
#[derive(Debug, Clone)]
pub struct FileIdentityStorage {
    root: PathBuf,
}

impl FileIdentityStorage {
    /// Create a storage rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the default storage root.
    pub fn default_path() -> Result<PathBuf, StorageError> {
        let dirs = directories::ProjectDirs::from("com", "raibid-labs", "gatehouse")
            .ok_or(StorageError::DataDirUnavailable)?;

        Ok(dirs.data_dir().join("identities"))
    }

    /// Create a storage at the default location.
    pub fn at_default_path() -> Result<Self, StorageError> {
        Ok(Self::new(Self::default_path()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn identity_dir(&self, identity: &UserId) -> PathBuf {
        self.root.join(path_component(identity.as_str()))
    }

    fn namespace_path(&self, identity: &UserId, namespace: &str) -> PathBuf {
        self.identity_dir(identity)
            .join(format!("{}.json", path_component(namespace)))
    }
}

/// Keep identity and namespace names from escaping the storage root.
fn path_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '@' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        format!("_{}", cleaned)
    } else {
        cleaned
    }
}

#[async_trait]
impl IdentityStorage for FileIdentityStorage {
    async fn load(&self, identity: &UserId, namespace: &str) -> Result<Option<Value>, StorageError> {
        let path = self.namespace_path(identity, namespace);
        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, identity: &UserId, namespace: &str, value: &Value) -> Result<(), StorageError> {
        let dir = self.identity_dir(identity);
        fs::create_dir_all(&dir).await?;

        let contents = serde_json::to_string_pretty(value)?;
        fs::write(self.namespace_path(identity, namespace), contents).await?;

        tracing::debug!(identity = %identity, namespace, "persisted identity data");
        Ok(())
    }

    async fn remove(&self, identity: &UserId, namespace: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.namespace_path(identity, namespace)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        // Only succeeds once the identity has no namespaces left.
        let _ = fs::remove_dir(self.identity_dir(identity)).await;
        tracing::debug!(identity = %identity, namespace, "removed identity data");
        Ok(())
    }

    async fn clear_identity(&self, identity: &UserId) -> Result<(), StorageError> {
        match fs::remove_dir_all(self.identity_dir(identity)).await {
            Ok(()) => {
                tracing::debug!(identity = %identity, "removed identity data");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn namespaces(&self, identity: &UserId) -> Result<Vec<String>, StorageError> {
        let mut entries = match fs::read_dir(self.identity_dir(identity)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
