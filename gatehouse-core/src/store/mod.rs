//! Credential and per-identity storage.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`CredentialStore`] - Holder of the current access credential and cached profile
//! - [`IdentityStorage`] - Trait for durable data keyed by user identity
//! - [`MemoryIdentityStorage`] - In-memory implementation for testing
//! - [`FileIdentityStorage`] - JSON files on disk (with `file-storage` feature)
//!
//! # Cookie-backed refresh credentials
//!
//! The refresh credential normally lives in an HTTP-only cookie owned by the
//! transport. [`CredentialStore`] never reads or writes it; its presence is
//! only inferred through [`AuthBoundary::has_refresh_marker`].
//!
//! [`AuthBoundary::has_refresh_marker`]: crate::boundary::AuthBoundary::has_refresh_marker

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::model::UserProfile;

mod identity;
#[cfg(feature = "file-storage")]
mod file;

pub use identity::{IdentityStorage, MemoryIdentityStorage, StorageError};
#[cfg(feature = "file-storage")]
pub use file::FileIdentityStorage;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the buffer is wiped when the secret is dropped.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume the secret and return the inner value.
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.0)
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Holder of the current access credential and the cached user profile.
///
/// All operations are total. Only the session context mutates the profile;
/// transports read the credential to authorize business requests.
#[derive(Default)]
pub struct CredentialStore {
    credential: RwLock<Option<Secret>>,
    profile: RwLock<Option<UserProfile>>,
}

impl CredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the access credential.
    pub fn set(&self, credential: Secret) {
        *self.credential.write() = Some(credential);
    }

    /// Replace the access credential, dropping it on `None`. The cached
    /// profile is untouched.
    pub(crate) fn replace(&self, credential: Option<Secret>) {
        *self.credential.write() = credential;
    }

    /// Current access credential, if any.
    pub fn get(&self) -> Option<Secret> {
        self.credential.read().clone()
    }

    pub fn has_credential(&self) -> bool {
        self.credential.read().is_some()
    }

    /// Drop the credential and the cached profile.
    pub fn clear(&self) {
        self.credential.write().take();
        self.profile.write().take();
    }

    /// Cached profile of the authenticated user.
    pub fn profile(&self) -> Option<UserProfile> {
        self.profile.read().clone()
    }

    pub(crate) fn set_profile(&self, profile: UserProfile) {
        *self.profile.write() = Some(profile);
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("has_credential", &self.has_credential())
            .field("profile", &self.profile.read().as_ref().map(|p| p.id.clone()))
            .finish()
    }
}
