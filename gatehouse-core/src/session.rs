//! The session state machine.
//!
//! [`SessionManager`] drives every transition of the shared
//! [`SessionContext`]:
//!
//! ```text
//! Anonymous ──startup_probe──▶ Initializing ──▶ Authenticated
//!     │                              │
//!     └────── (no marker) ──────────▶└────────▶ Unauthenticated
//! ```
//!
//! `login`, `logout`, and `force_logout` move between the two stable states.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::boundary::{AuthBoundary, AuthError};
use crate::context::{SessionContext, Teardown};
use crate::events::AuthEvent;
use crate::guard::{GuardError, RequestGuard};
use crate::model::{
    LoginCredentials, RegisteredUser, RegistrationRequest, SessionSnapshot, SessionStatus,
    UserProfile,
};
use crate::refresh::RefreshCoordinator;

/// Owns the authentication lifecycle of one process.
///
/// Cloning shares the session, the refresh ticket, and the boundary.
#[derive(Clone)]
pub struct SessionManager {
    boundary: Arc<dyn AuthBoundary>,
    context: SessionContext,
    refresher: RefreshCoordinator,
    guard: RequestGuard,
}

impl SessionManager {
    pub fn new(boundary: Arc<dyn AuthBoundary>, context: SessionContext) -> Self {
        let refresher = RefreshCoordinator::new(boundary.clone(), context.clone());
        let guard = RequestGuard::new(refresher.clone());

        Self {
            boundary,
            context,
            refresher,
            guard,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.refresher
    }

    /// The request guard bound to this session, for business requests.
    pub fn request_guard(&self) -> &RequestGuard {
        &self.guard
    }

    pub fn status(&self) -> SessionStatus {
        self.context.status()
    }

    pub fn is_authenticated(&self) -> bool {
        self.context.is_authenticated()
    }

    pub fn is_initialized(&self) -> bool {
        self.context.is_initialized()
    }

    pub fn current_profile(&self) -> Option<UserProfile> {
        self.context.current_profile()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.context.snapshot()
    }

    pub fn subscribe_signals(&self) -> watch::Receiver<SessionSnapshot> {
        self.context.subscribe_signals()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.context.subscribe_events()
    }

    /// Run a business request through the request guard.
    pub async fn guard<T, F, Fut>(&self, op: F) -> Result<T, GuardError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AuthError>>,
    {
        self.guard.guard(op).await
    }

    /// Resolve the initial session state.
    ///
    /// Without a refresh marker the session settles to `Unauthenticated`
    /// without any network call. With one, the profile is fetched through the
    /// request guard, so an expired access credential is renewed once.
    ///
    /// Calling this while a probe is running or a session is established
    /// returns the current status unchanged.
    pub async fn startup_probe(&self) -> SessionStatus {
        if !self.boundary.has_refresh_marker() {
            debug!("no refresh marker, skipping startup probe");
            self.context.settle_anonymous().await;
            return self.context.status();
        }

        if !self.context.begin_probe() {
            debug!(status = ?self.context.status(), "startup probe not applicable");
            return self.context.status();
        }

        info!("probing existing session");
        let generation = self.context.generation();
        let boundary = self.boundary.as_ref();
        match self.guard.guard(move || boundary.get_profile()).await {
            Ok(profile) => self.context.establish(profile, None).await,
            // Already torn down by the guard.
            Err(GuardError::SessionExpired) => {}
            Err(GuardError::Request(e)) => {
                warn!(error = %e, "startup probe failed");
                // A login that landed meanwhile stays.
                self.context.teardown(Teardown::Logout, Some(generation)).await;
            }
        }

        self.context.status()
    }

    /// Sign in.
    ///
    /// A rejected login leaves the prior state untouched and is never retried.
    /// A profile fetch that fails after a successful login tears the partial
    /// session down before the error is returned.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<UserProfile, AuthError> {
        info!(identifier = %credentials.identifier, "signing in");
        let grant = self.boundary.login(credentials).await.inspect_err(|e| {
            warn!(error = %e, "sign in rejected");
        })?;

        // Renewals still in flight belong to the previous session from here on.
        self.context.accept_login(grant.credential).await;

        let profile = match grant.profile {
            Some(profile) => profile,
            None => match self.boundary.get_profile().await {
                Ok(profile) => profile,
                Err(e) => {
                    warn!(error = %e, "profile fetch after sign in failed");
                    self.context.teardown(Teardown::Logout, None).await;
                    return Err(e);
                }
            },
        };

        self.context.establish(profile.clone(), None).await;
        Ok(profile)
    }

    /// Sign out. Always reaches `Unauthenticated`.
    ///
    /// The server-side logout is attempted first; its failure is logged and
    /// swallowed.
    pub async fn logout(&self) {
        if let Err(e) = self.boundary.logout().await {
            warn!(error = %e, "server logout failed, clearing local session anyway");
        }
        self.context.teardown(Teardown::Logout, None).await;
    }

    /// Sign out locally without contacting the server.
    ///
    /// Transport-held credentials are forgotten as well.
    pub async fn force_logout(&self) {
        self.boundary.forget();
        self.context.teardown(Teardown::Logout, None).await;
    }

    /// Re-fetch the profile of the current session through the request guard.
    ///
    /// The same identity replaces the profile silently; a different identity
    /// is a user switch.
    pub async fn fetch_profile(&self) -> Result<UserProfile, GuardError> {
        let boundary = self.boundary.as_ref();
        let profile = self.guard.guard(move || boundary.get_profile()).await?;
        self.context.establish(profile.clone(), None).await;
        Ok(profile)
    }

    /// Create an account. Does not sign in.
    pub async fn register(&self, request: &RegistrationRequest) -> Result<RegisteredUser, AuthError> {
        info!(email = %request.email, "registering account");
        self.boundary.register(request).await
    }

    /// Return the session to `Anonymous` and release any renewal waiters.
    pub async fn reset(&self) {
        self.refresher.reset();
        self.context.reset().await;
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("context", &self.context)
            .field("refresher", &self.refresher)
            .finish()
    }
}
