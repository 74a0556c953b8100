//! Shared session context.
//!
//! [`SessionContext`] owns the one session of the process: the credential
//! store, the session status, the outward signals, and the event fan-out. It
//! is injected into every collaborator instead of living in a global.
//!
//! Every transition runs under an async dispatch lock, so events reach the
//! [`DependentStateCoordinator`] in the same order as the state changes they
//! describe, and the next transition waits until the previous event was
//! fully consumed. Snapshots are published only after dependent caches have
//! been reset.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info};

use crate::dependents::DependentStateCoordinator;
use crate::events::AuthEvent;
use crate::model::{SessionSnapshot, SessionStatus, UserProfile};
use crate::store::{CredentialStore, Secret};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Why the session is being torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Teardown {
    /// Explicit logout, or settling to unauthenticated without a session.
    Logout,
    /// Credential renewal failed.
    Expired,
}

#[derive(Debug, Clone, Copy, Default)]
struct SessionState {
    status: SessionStatus,
    initialized: bool,
    expired: bool,
    /// Bumped whenever the session identity is replaced or dropped, so that
    /// in-flight renewals started under an older session can be discarded.
    generation: u64,
}

/// Handle to the process-wide session. Cloning shares the session.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    credentials: CredentialStore,
    state: Mutex<SessionState>,
    dispatch: tokio::sync::Mutex<()>,
    dependents: DependentStateCoordinator,
    signals: watch::Sender<SessionSnapshot>,
    events: broadcast::Sender<AuthEvent>,
}

impl SessionContext {
    /// Create a context whose identity changes fan out to `dependents`.
    pub fn new(dependents: DependentStateCoordinator) -> Self {
        let (signals, _) = watch::channel(SessionSnapshot::default());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(ContextInner {
                credentials: CredentialStore::new(),
                state: Mutex::new(SessionState::default()),
                dispatch: tokio::sync::Mutex::new(()),
                dependents,
                signals,
                events,
            }),
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }

    pub fn dependents(&self) -> &DependentStateCoordinator {
        &self.inner.dependents
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.signals.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.signals.borrow().status
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.signals.borrow().is_authenticated()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.signals.borrow().initialized
    }

    /// Profile of the published snapshot.
    pub fn current_profile(&self) -> Option<UserProfile> {
        self.inner.signals.borrow().profile.clone()
    }

    /// Watch the outward signals.
    pub fn subscribe_signals(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.signals.subscribe()
    }

    /// Outward signals as a stream, starting with the current value.
    pub fn signal_stream(&self) -> WatchStream<SessionSnapshot> {
        WatchStream::new(self.subscribe_signals())
    }

    /// Observe identity events.
    ///
    /// Events are broadcast after dependent caches have been reset. A lagging
    /// receiver loses events; the dependent-state coordinator never does.
    pub fn subscribe_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.inner.state.lock().generation
    }

    /// Return to `Anonymous`, resetting dependent caches. Intended for tests.
    pub async fn reset(&self) {
        let _ordered = self.inner.dispatch.lock().await;

        let had_identity = self.inner.credentials.profile().is_some();
        self.inner.credentials.clear();
        {
            let mut state = self.inner.state.lock();
            let generation = state.generation.wrapping_add(1);
            *state = SessionState {
                generation,
                ..SessionState::default()
            };
        }

        if had_identity {
            self.deliver(AuthEvent::LoggedOut).await;
        }
        self.inner.dependents.forget();
        self.publish();
        debug!("session context reset");
    }

    /// `Anonymous` or `Unauthenticated` to `Initializing`.
    ///
    /// Returns `false` if a probe cannot start from the current state.
    pub(crate) fn begin_probe(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            match state.status {
                SessionStatus::Anonymous | SessionStatus::Unauthenticated => {
                    state.status = SessionStatus::Initializing;
                }
                _ => return false,
            }
        }
        self.publish();
        true
    }

    /// A login grant arrived: install its credential and invalidate every
    /// renewal started under the previous session.
    ///
    /// The cached profile is kept until [`establish`](Self::establish) so the
    /// identity change is still detected there.
    pub(crate) async fn accept_login(&self, credential: Option<Secret>) {
        let _ordered = self.inner.dispatch.lock().await;

        self.inner.credentials.replace(credential);
        let mut state = self.inner.state.lock();
        state.generation = state.generation.wrapping_add(1);
        debug!(generation = state.generation, "login grant accepted");
    }

    /// Settle a session that never started to `Unauthenticated`.
    ///
    /// Only applies to `Anonymous`; any other state is left alone.
    pub(crate) async fn settle_anonymous(&self) {
        let _ordered = self.inner.dispatch.lock().await;

        if self.inner.state.lock().status != SessionStatus::Anonymous {
            return;
        }
        self.teardown_ordered(Teardown::Logout, None).await;
    }

    /// Enter `Authenticated` with `profile`.
    ///
    /// Emits `LoggedIn` or `UserSwitched` when the identity key changes and
    /// nothing when the same user's profile is replaced.
    pub(crate) async fn establish(&self, profile: UserProfile, credential: Option<Secret>) {
        let _ordered = self.inner.dispatch.lock().await;

        let previous = self.inner.credentials.profile().map(|p| p.id);
        if let Some(credential) = credential {
            self.inner.credentials.set(credential);
        }
        self.inner.credentials.set_profile(profile.clone());

        {
            let mut state = self.inner.state.lock();
            let changed = previous.as_ref() != Some(&profile.id)
                || state.status != SessionStatus::Authenticated;
            if changed {
                state.generation = state.generation.wrapping_add(1);
            }
            state.status = SessionStatus::Authenticated;
            state.initialized = true;
            state.expired = false;
        }

        let event = match previous {
            None => Some(AuthEvent::LoggedIn {
                profile: profile.clone(),
            }),
            Some(from) if from != profile.id => Some(AuthEvent::UserSwitched {
                from,
                to: profile.clone(),
            }),
            Some(_) => None,
        };

        info!(identity = %profile.id, "session authenticated");
        if let Some(event) = event {
            self.deliver(event).await;
        }
        self.publish();
    }

    /// Record a successful renewal started under `generation`.
    ///
    /// Returns `false` and discards the credential if the session changed
    /// while the renewal was in flight.
    pub(crate) fn refreshed(&self, generation: u64, credential: Option<Secret>) -> bool {
        {
            let mut state = self.inner.state.lock();
            if state.generation != generation {
                return false;
            }
            if let Some(credential) = credential {
                self.inner.credentials.set(credential);
            }
            // Without a profile the session stays where it is until one is fetched.
            if self.inner.credentials.profile().is_some() {
                state.status = SessionStatus::Authenticated;
            }
        }
        self.publish();
        true
    }

    /// Tear the session down to `Unauthenticated`.
    ///
    /// With `expected_generation` set, the teardown only happens if no other
    /// transition happened since that generation was read; returns whether
    /// the teardown was applied. Emits `LoggedOut` or `RefreshFailed` only if
    /// an identity was active, so repeated calls are idempotent.
    pub(crate) async fn teardown(&self, cause: Teardown, expected_generation: Option<u64>) -> bool {
        let _ordered = self.inner.dispatch.lock().await;
        self.teardown_ordered(cause, expected_generation).await
    }

    /// Body of [`teardown`](Self::teardown); the dispatch lock must be held.
    async fn teardown_ordered(&self, cause: Teardown, expected_generation: Option<u64>) -> bool {
        let had_identity = {
            let mut state = self.inner.state.lock();
            if expected_generation.is_some_and(|g| g != state.generation) {
                return false;
            }
            let had_identity = self.inner.credentials.profile().is_some();
            self.inner.credentials.clear();

            state.status = SessionStatus::Unauthenticated;
            state.initialized = true;
            state.expired = cause == Teardown::Expired;
            state.generation = state.generation.wrapping_add(1);
            had_identity
        };

        if had_identity {
            let event = match cause {
                Teardown::Logout => AuthEvent::LoggedOut,
                Teardown::Expired => AuthEvent::RefreshFailed,
            };
            info!(event = event.name(), "session ended");
            self.deliver(event).await;
        }
        self.publish();
        true
    }

    /// Hand an event to the coordinator, then to outward observers.
    async fn deliver(&self, event: AuthEvent) {
        self.inner.dependents.handle(&event).await;
        // No receivers is fine.
        let _ = self.inner.events.send(event);
    }

    fn publish(&self) {
        let snapshot = {
            let state = self.inner.state.lock();
            SessionSnapshot {
                status: state.status,
                profile: self.inner.credentials.profile(),
                initialized: state.initialized,
                expired: state.expired,
            }
        };
        self.inner.signals.send_replace(snapshot);
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(DependentStateCoordinator::new())
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = *self.inner.state.lock();
        f.debug_struct("SessionContext")
            .field("status", &state.status)
            .field("initialized", &state.initialized)
            .field("expired", &state.expired)
            .field("credentials", &self.inner.credentials)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anna() -> UserProfile {
        UserProfile::new("1", "anna@example.com")
    }

    #[tokio::test]
    async fn test_initial_snapshot() {
        let context = SessionContext::default();
        let snapshot = context.snapshot();

        assert_eq!(snapshot.status, SessionStatus::Anonymous);
        assert!(!snapshot.initialized);
        assert!(!context.is_authenticated());
    }

    #[tokio::test]
    async fn test_establish_emits_logged_in_once() {
        let context = SessionContext::default();
        let mut events = context.subscribe_events();

        context.establish(anna(), Some(Secret::new("access"))).await;
        context.establish(anna().with_display_name("Anna"), None).await;

        assert_eq!(events.try_recv().unwrap(), AuthEvent::LoggedIn { profile: anna() });
        assert!(events.try_recv().is_err());
        assert_eq!(context.current_profile().unwrap().display_name, "Anna");
        assert_eq!(context.credentials().get().unwrap().expose(), "access");
    }

    #[tokio::test]
    async fn test_establish_other_identity_emits_switch() {
        let context = SessionContext::default();
        let mut events = context.subscribe_events();
        let boris = UserProfile::new("2", "boris@example.com");

        context.establish(anna(), None).await;
        context.establish(boris.clone(), None).await;

        let _ = events.try_recv().unwrap();
        assert_eq!(
            events.try_recv().unwrap(),
            AuthEvent::UserSwitched {
                from: anna().id,
                to: boris,
            }
        );
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let context = SessionContext::default();
        context.establish(anna(), None).await;
        let mut events = context.subscribe_events();

        assert!(context.teardown(Teardown::Logout, None).await);
        assert!(context.teardown(Teardown::Logout, None).await);

        assert_eq!(events.try_recv().unwrap(), AuthEvent::LoggedOut);
        assert!(events.try_recv().is_err());
        assert_eq!(context.status(), SessionStatus::Unauthenticated);
        assert!(context.current_profile().is_none());
    }

    #[tokio::test]
    async fn test_stale_generation_teardown_is_discarded() {
        let context = SessionContext::default();
        let stale = context.generation();
        context.establish(anna(), None).await;

        assert!(!context.teardown(Teardown::Expired, Some(stale)).await);
        assert!(context.is_authenticated());
    }

    #[tokio::test]
    async fn test_refreshed_discards_stale_generation() {
        let context = SessionContext::default();
        context.establish(anna(), None).await;
        let generation = context.generation();
        context.teardown(Teardown::Logout, None).await;

        assert!(!context.refreshed(generation, Some(Secret::new("late"))));
        assert!(context.credentials().get().is_none());
        assert_eq!(context.status(), SessionStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_expired_teardown_sets_flag() {
        let context = SessionContext::default();
        context.establish(anna(), None).await;
        let mut events = context.subscribe_events();

        context.teardown(Teardown::Expired, None).await;

        assert!(context.snapshot().expired);
        assert_eq!(events.try_recv().unwrap(), AuthEvent::RefreshFailed);
    }

    #[tokio::test]
    async fn test_reset_returns_to_anonymous() {
        let context = SessionContext::default();
        context.establish(anna(), Some(Secret::new("access"))).await;

        context.reset().await;

        let snapshot = context.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Anonymous);
        assert!(!snapshot.initialized);
        assert!(!context.credentials().has_credential());
    }
}
