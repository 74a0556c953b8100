//! Scripted in-memory boundary shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use gatehouse_core::{
    AuthBoundary, AuthError, LoginCredentials, LoginGrant, RefreshGrant, Secret, UserProfile,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Boundary whose responses are queued up front.
///
/// An empty queue answers with `401`.
#[derive(Default)]
pub struct ScriptedBoundary {
    pub marker: AtomicBool,
    pub logins: Mutex<VecDeque<Result<LoginGrant, AuthError>>>,
    pub profiles: Mutex<VecDeque<Result<UserProfile, AuthError>>>,
    pub refreshes: Mutex<VecDeque<Result<RefreshGrant, AuthError>>>,
    pub refresh_delay: Mutex<Duration>,
    pub profile_delay: Mutex<Duration>,

    pub login_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub forget_calls: AtomicUsize,
}

impl ScriptedBoundary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_marker(self) -> Self {
        self.marker.store(true, Ordering::SeqCst);
        self
    }

    pub fn grant_login(self, profile: UserProfile) -> Self {
        self.logins.lock().push_back(Ok(LoginGrant {
            profile: Some(profile),
            credential: Some(Secret::new("access-login")),
        }));
        self
    }

    /// Login that returns only a body credential; the profile is fetched.
    pub fn grant_credential(self, credential: &str) -> Self {
        self.logins.lock().push_back(Ok(LoginGrant {
            profile: None,
            credential: Some(Secret::new(credential)),
        }));
        self
    }

    pub fn answer_profile(self, result: Result<UserProfile, AuthError>) -> Self {
        self.profiles.lock().push_back(result);
        self
    }

    pub fn answer_refresh(self, result: Result<RefreshGrant, AuthError>) -> Self {
        self.refreshes.lock().push_back(result);
        self
    }

    pub fn slow_refresh(self, delay: Duration) -> Self {
        *self.refresh_delay.lock() = delay;
        self
    }

    pub fn slow_profile(self, delay: Duration) -> Self {
        *self.profile_delay.lock() = delay;
        self
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthBoundary for ScriptedBoundary {
    async fn login(&self, _: &LoginCredentials) -> Result<LoginGrant, AuthError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.logins
            .lock()
            .pop_front()
            .unwrap_or(Err(AuthError::unauthorized()))
    }

    async fn logout(&self) -> Result<(), AuthError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_profile(&self) -> Result<UserProfile, AuthError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.profile_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.profiles
            .lock()
            .pop_front()
            .unwrap_or(Err(AuthError::unauthorized()))
    }

    async fn refresh(&self) -> Result<RefreshGrant, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.refresh_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.refreshes
            .lock()
            .pop_front()
            .unwrap_or(Err(AuthError::unauthorized()))
    }

    fn has_refresh_marker(&self) -> bool {
        self.marker.load(Ordering::SeqCst)
    }

    fn forget(&self) {
        self.forget_calls.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn anna() -> UserProfile {
    UserProfile::new("1", "anna@example.com").with_display_name("Anna")
}

pub fn boris() -> UserProfile {
    UserProfile::new("2", "boris@example.com").with_display_name("Boris")
}

pub fn renewed(credential: &str) -> Result<RefreshGrant, AuthError> {
    Ok(RefreshGrant {
        credential: Some(Secret::new(credential)),
    })
}
