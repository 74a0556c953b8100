//! The authentication boundary consumed by the session core.
//!
//! This module provides:
//! - [`AuthError`] - Failure taxonomy of boundary calls and business requests
//! - [`LoginGrant`], [`RefreshGrant`] - Successful boundary responses
//! - [`AuthBoundary`] - Trait implemented by the transport (see `gatehouse-http`)

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{LoginCredentials, RegisteredUser, RegistrationRequest, UserProfile};
use crate::store::Secret;

/// Failure of a boundary call or an authenticated business request.
///
/// `Clone` so that a single refresh outcome can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The credential is missing, expired, or invalid (HTTP 401).
    #[error("credential rejected by the server")]
    Unauthorized { detail: Option<String> },

    /// The credential is valid but lacks access (HTTP 403).
    #[error("access denied")]
    Forbidden { detail: Option<String> },

    /// Input rejected by the server (HTTP 400/422). Never retried.
    #[error("request rejected: {}", .detail.as_deref().unwrap_or("invalid input"))]
    Validation { detail: Option<String> },

    #[error("resource not found")]
    NotFound { detail: Option<String> },

    /// Connection failure or timeout.
    #[error("network failure: {message}")]
    NetworkFailure { message: String },

    #[error("server error (status {status})")]
    ServerError { status: u16, detail: Option<String> },

    /// Any other non-success status, including 402 and 429.
    #[error("unexpected response status {status}")]
    Unexpected { status: u16, detail: Option<String> },
}

impl AuthError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        match status {
            401 => Self::Unauthorized { detail },
            403 => Self::Forbidden { detail },
            400 | 422 => Self::Validation { detail },
            404 => Self::NotFound { detail },
            500..=599 => Self::ServerError { status, detail },
            _ => Self::Unexpected { status, detail },
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkFailure {
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::Unauthorized { detail: None }
    }

    /// HTTP status behind this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::Forbidden { .. } => Some(403),
            Self::Validation { .. } => Some(400),
            Self::NotFound { .. } => Some(404),
            Self::NetworkFailure { .. } => None,
            Self::ServerError { status, .. } | Self::Unexpected { status, .. } => Some(*status),
        }
    }

    /// Server-provided detail message.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Unauthorized { detail }
            | Self::Forbidden { detail }
            | Self::Validation { detail }
            | Self::NotFound { detail }
            | Self::ServerError { detail, .. }
            | Self::Unexpected { detail, .. } => detail.as_deref(),
            Self::NetworkFailure { .. } => None,
        }
    }

    /// Whether renewing the credential could make a retry succeed.
    ///
    /// Only 401 qualifies. Whether 402 should also trigger renewal is
    /// unresolved upstream, so it is surfaced as [`AuthError::Unexpected`].
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Inline message for display next to the failed action.
    pub fn user_message(&self) -> String {
        if let Some(detail) = self.detail().filter(|d| !d.trim().is_empty()) {
            return detail.to_string();
        }

        match self {
            Self::Validation { .. } => "Invalid data. Check the entered fields.".to_string(),
            Self::Unauthorized { .. } => "Invalid login or password.".to_string(),
            Self::Forbidden { .. } => "You do not have access.".to_string(),
            Self::NotFound { .. } => "Resource not found.".to_string(),
            Self::ServerError { .. } => "Server error. Please try again later.".to_string(),
            Self::NetworkFailure { .. } => {
                "Could not reach the server. Check your connection.".to_string()
            }
            Self::Unexpected { .. } => "The request could not be completed.".to_string(),
        }
    }
}

/// Successful login response.
#[derive(Debug, Clone, Default)]
pub struct LoginGrant {
    /// Profile, when the login endpoint returns one.
    pub profile: Option<UserProfile>,

    /// Access credential, when it is returned in the body rather than a cookie.
    pub credential: Option<Secret>,
}

/// Successful credential renewal.
#[derive(Debug, Clone, Default)]
pub struct RefreshGrant {
    /// New access credential. `None` when the server manages it in a cookie.
    pub credential: Option<Secret>,
}

/// Remote authentication service as seen by the session core.
///
/// Implementations own the transport: cookies, timeouts, and wire formats.
/// A transport timeout must be reported as [`AuthError::NetworkFailure`].
#[async_trait]
pub trait AuthBoundary: Send + Sync {
    /// Exchange credentials for a session.
    async fn login(&self, credentials: &LoginCredentials) -> Result<LoginGrant, AuthError>;

    /// End the server-side session. Best effort.
    async fn logout(&self) -> Result<(), AuthError>;

    /// Fetch the profile of the current session.
    async fn get_profile(&self) -> Result<UserProfile, AuthError>;

    /// Renew the access credential using the refresh credential.
    async fn refresh(&self) -> Result<RefreshGrant, AuthError>;

    /// Local check for a refresh-credential marker. Never touches the network.
    fn has_refresh_marker(&self) -> bool;

    /// Drop transport-held credentials, such as cookies, without contacting
    /// the server. Called when the session is force-ended locally.
    fn forget(&self) {}

    /// Create a new account.
    async fn register(&self, request: &RegistrationRequest) -> Result<RegisteredUser, AuthError> {
        let _ = request;
        Err(AuthError::NotFound {
            detail: Some("registration is not supported by this boundary".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(AuthError::from_status(401, None).is_authorization_failure());
        assert!(matches!(AuthError::from_status(403, None), AuthError::Forbidden { .. }));
        assert!(matches!(AuthError::from_status(422, None), AuthError::Validation { .. }));
        assert!(matches!(
            AuthError::from_status(503, None),
            AuthError::ServerError { status: 503, .. }
        ));
        assert!(matches!(
            AuthError::from_status(402, None),
            AuthError::Unexpected { status: 402, .. }
        ));
    }

    #[test]
    fn test_payment_required_is_not_an_authorization_failure() {
        assert!(!AuthError::from_status(402, None).is_authorization_failure());
    }

    #[test]
    fn test_user_message_prefers_server_detail() {
        let err = AuthError::from_status(400, Some("Email already registered".to_string()));
        assert_eq!(err.user_message(), "Email already registered");

        let err = AuthError::from_status(400, Some("  ".to_string()));
        assert_eq!(err.user_message(), "Invalid data. Check the entered fields.");
    }

    #[test]
    fn test_user_message_by_category() {
        assert_eq!(AuthError::unauthorized().user_message(), "Invalid login or password.");
        assert_eq!(
            AuthError::from_status(500, None).user_message(),
            "Server error. Please try again later."
        );
        assert_eq!(
            AuthError::network("timed out").user_message(),
            "Could not reach the server. Check your connection."
        );
    }

    #[test]
    fn test_status() {
        assert_eq!(AuthError::from_status(418, None).status(), Some(418));
        assert_eq!(AuthError::network("reset").status(), None);
    }
}
