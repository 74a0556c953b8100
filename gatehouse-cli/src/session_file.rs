//! Session persistence between CLI invocations.
//!
//! Each invocation is a fresh process, so the cookies and bearer credential
//! of the service are saved to a JSON file after every command and restored
//! before the next one. The file is written with owner-only permissions on
//! Unix; it is not encrypted.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use gatehouse_core::Secret;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Persisted transport state of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSession {
    /// `Cookie` header value for the service.
    #[serde(default)]
    pub cookies: Option<String>,

    /// Access credential returned in a response body.
    #[serde(default)]
    pub credential: Option<Secret>,

    pub saved_at: DateTime<Utc>,
}

impl SavedSession {
    pub fn is_empty(&self) -> bool {
        self.cookies.as_deref().is_none_or(str::is_empty) && self.credential.is_none()
    }
}

/// JSON file holding a [`SavedSession`].
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved session, if any.
    pub fn load(&self) -> Result<Option<SavedSession>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session from {:?}", self.path))?;
        let saved = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse session from {:?}", self.path))?;
        Ok(Some(saved))
    }

    /// Save `session`, or remove the file when there is nothing to keep.
    pub fn save(&self, session: &SavedSession) -> Result<()> {
        if session.is_empty() {
            return self.clear();
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write session to {:?}", self.path))?;
        restrict_permissions(&self.path)?;

        debug!(path = ?self.path, "session saved");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove session file {:?}", self.path))?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
