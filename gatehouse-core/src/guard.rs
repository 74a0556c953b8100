//! Bounded retry of authenticated operations.

use std::future::Future;
use thiserror::Error;
use tracing::{debug, warn};

use crate::boundary::AuthError;
use crate::refresh::{RefreshCoordinator, RefreshFailed};

/// Failure of a guarded operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    /// Renewal failed; the session was logged out.
    #[error("session expired, sign in again")]
    SessionExpired,

    /// The operation's own failure, returned verbatim.
    #[error(transparent)]
    Request(#[from] AuthError),
}

impl GuardError {
    /// Inline message for display next to the failed action.
    pub fn user_message(&self) -> String {
        match self {
            Self::SessionExpired => "Your session has expired. Please sign in again.".to_string(),
            Self::Request(e) => e.user_message(),
        }
    }
}

/// Makes an operation resilient to one expired-credential failure.
///
/// Renewal is strictly reactive: an operation that succeeds on its first
/// attempt never touches the [`RefreshCoordinator`].
#[derive(Clone, Debug)]
pub struct RequestGuard {
    refresher: RefreshCoordinator,
}

impl RequestGuard {
    pub fn new(refresher: RefreshCoordinator) -> Self {
        Self { refresher }
    }

    /// Run `op`, renewing the credential and retrying once on a 401.
    ///
    /// - Non-authorization failures are returned unchanged without renewal.
    /// - After a successful renewal the second attempt's outcome is returned
    ///   as is, even if it is another 401.
    /// - If renewal fails the session has been force-logged-out and
    ///   [`GuardError::SessionExpired`] is returned.
    /// - If renewal was superseded by a logout or login, the original 401 is
    ///   returned without touching the new session.
    /// - If the caller leading the renewal was dropped, the renewal is led
    ///   again once; a second abandonment returns the original 401.
    pub async fn guard<T, F, Fut>(&self, mut op: F) -> Result<T, GuardError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AuthError>>,
    {
        let first = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !first.is_authorization_failure() {
            return Err(GuardError::Request(first));
        }

        debug!("authorization failure, renewing credential before retrying once");
        let mut renewal = self.refresher.refresh().await;
        if renewal == Err(RefreshFailed::Abandoned) {
            debug!("renewal leader went away, leading a new renewal");
            renewal = self.refresher.refresh().await;
        }

        match renewal {
            Ok(()) => op().await.map_err(GuardError::Request),
            // The coordinator has already torn the session down.
            Err(RefreshFailed::Rejected(e)) => {
                warn!(error = %e, "renewal failed, session expired");
                Err(GuardError::SessionExpired)
            }
            Err(e) => {
                debug!(error = %e, "renewal did not complete, not retrying");
                Err(GuardError::Request(first))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{AuthBoundary, LoginGrant, RefreshGrant};
    use crate::context::SessionContext;
    use crate::model::{LoginCredentials, UserProfile};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Renewals {
        calls: AtomicUsize,
        ok: bool,
    }

    #[async_trait]
    impl AuthBoundary for Renewals {
        async fn login(&self, _: &LoginCredentials) -> Result<LoginGrant, AuthError> {
            Ok(LoginGrant::default())
        }

        async fn logout(&self) -> Result<(), AuthError> {
            Ok(())
        }

        async fn get_profile(&self) -> Result<UserProfile, AuthError> {
            Ok(UserProfile::new("1", "anna@example.com"))
        }

        async fn refresh(&self) -> Result<RefreshGrant, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.ok {
                Ok(RefreshGrant::default())
            } else {
                Err(AuthError::network("timed out"))
            }
        }

        fn has_refresh_marker(&self) -> bool {
            true
        }
    }

    async fn guard(ok: bool) -> (RequestGuard, Arc<Renewals>, SessionContext) {
        let boundary = Arc::new(Renewals {
            calls: AtomicUsize::new(0),
            ok,
        });
        let context = SessionContext::default();
        context
            .establish(UserProfile::new("1", "anna@example.com"), None)
            .await;
        let refresher = RefreshCoordinator::new(boundary.clone(), context.clone());
        (RequestGuard::new(refresher), boundary, context)
    }

    #[tokio::test]
    async fn test_success_never_refreshes() {
        let (guard, boundary, _context) = guard(true).await;

        let value = guard.guard(|| async { Ok::<_, AuthError>(42) }).await;

        assert_eq!(value, Ok(42));
        assert_eq!(boundary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_authorization_failure_passes_through() {
        let (guard, boundary, _context) = guard(true).await;
        let attempts = AtomicUsize::new(0);
        let counter = &attempts;

        let result = guard
            .guard(|| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(AuthError::from_status(503, None))
            })
            .await;

        assert_eq!(
            result,
            Err(GuardError::Request(AuthError::ServerError { status: 503, detail: None }))
        );
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(boundary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retries_once_after_refresh() {
        let (guard, boundary, _context) = guard(true).await;
        let attempts = AtomicUsize::new(0);
        let counter = &attempts;

        let result = guard
            .guard(|| async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(AuthError::unauthorized())
                } else {
                    Ok("statement")
                }
            })
            .await;

        assert_eq!(result, Ok("statement"));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(boundary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_unauthorized_is_returned_verbatim() {
        let (guard, boundary, context) = guard(true).await;
        let attempts = AtomicUsize::new(0);
        let counter = &attempts;

        let result = guard
            .guard(|| async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(AuthError::Unauthorized {
                    detail: Some(format!("attempt {}", n)),
                })
            })
            .await;

        assert_eq!(
            result,
            Err(GuardError::Request(AuthError::Unauthorized {
                detail: Some("attempt 1".to_string())
            }))
        );
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(boundary.calls.load(Ordering::SeqCst), 1);
        assert!(context.is_authenticated());
    }

    #[tokio::test]
    async fn test_failed_refresh_expires_session() {
        let (guard, _boundary, context) = guard(false).await;
        let attempts = AtomicUsize::new(0);
        let counter = &attempts;

        let result = guard
            .guard(|| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(AuthError::unauthorized())
            })
            .await;

        assert_eq!(result, Err(GuardError::SessionExpired));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(!context.is_authenticated());
        assert!(context.snapshot().expired);
    }

    #[test]
    fn test_user_message() {
        assert_eq!(
            GuardError::SessionExpired.user_message(),
            "Your session has expired. Please sign in again."
        );
        assert_eq!(
            GuardError::Request(AuthError::from_status(403, None)).user_message(),
            "You do not have access."
        );
    }
}
