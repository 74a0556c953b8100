//! Top-level error types for Gatehouse.

use thiserror::Error;

use crate::boundary::AuthError;
use crate::guard::GuardError;
use crate::refresh::RefreshFailed;
use crate::store::StorageError;

/// Top-level error type encompassing all Gatehouse errors.
#[derive(Debug, Error)]
pub enum GatehouseError {
    /// Error from a boundary call.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Credential renewal failed.
    #[error(transparent)]
    Refresh(#[from] RefreshFailed),

    /// Error from a guarded request.
    #[error(transparent)]
    Guard(#[from] GuardError),

    /// Error from identity storage.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl GatehouseError {
    /// Inline message for display next to the failed action.
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth(e) => e.user_message(),
            Self::Guard(e) => e.user_message(),
            Self::Refresh(_) => GuardError::SessionExpired.user_message(),
            Self::Storage(_) | Self::Config { .. } => self.to_string(),
        }
    }
}
