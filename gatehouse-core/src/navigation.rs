//! Route access decisions driven by the session signals.

use tokio::sync::watch;
use tracing::debug;

use crate::model::SessionSnapshot;

pub const DEFAULT_LOGIN_ROUTE: &str = "/login";
pub const DEFAULT_HOME_ROUTE: &str = "/";

/// Authentication requirement of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RouteAccess {
    /// Reachable by anyone.
    #[default]
    Public,
    /// Reachable only with an authenticated session.
    RequiresAuth,
    /// Reachable only without a session, like the login and registration pages.
    GuestOnly,
}

/// Why navigation was redirected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    LoginRequired,
    /// The session ended because credential renewal failed.
    SessionExpired,
    AlreadyAuthenticated,
}

impl RedirectReason {
    /// Explanatory message for the redirect target, if one should be shown.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            Self::SessionExpired => Some("Your session has expired. Please sign in again."),
            Self::LoginRequired | Self::AlreadyAuthenticated => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationDecision {
    Allow,
    Redirect { to: String, reason: RedirectReason },
}

impl NavigationDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Decides whether a route may be entered.
///
/// Decisions are deferred until the session has been initialized, so a
/// protected route is never rejected while the startup probe is running.
#[derive(Debug, Clone)]
pub struct NavigationGuard {
    signals: watch::Receiver<SessionSnapshot>,
    login_route: String,
    home_route: String,
}

impl NavigationGuard {
    pub fn new(signals: watch::Receiver<SessionSnapshot>) -> Self {
        Self {
            signals,
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            home_route: DEFAULT_HOME_ROUTE.to_string(),
        }
    }

    pub fn with_routes(mut self, login: impl Into<String>, home: impl Into<String>) -> Self {
        self.login_route = login.into();
        self.home_route = home.into();
        self
    }

    /// Wait for initialization, then decide.
    ///
    /// If the session context is dropped before initializing, the last
    /// published snapshot is used.
    pub async fn check(&mut self, access: RouteAccess) -> NavigationDecision {
        if access == RouteAccess::Public {
            return NavigationDecision::Allow;
        }

        let initialized = match self.signals.wait_for(|s| s.initialized).await {
            Ok(snapshot) => Some(snapshot.clone()),
            Err(_) => None,
        };
        let snapshot = initialized.unwrap_or_else(|| {
            debug!("session signals closed before initialization");
            self.signals.borrow().clone()
        });
        self.evaluate(&snapshot, access)
    }

    /// Decide against a given snapshot without waiting.
    pub fn evaluate(&self, snapshot: &SessionSnapshot, access: RouteAccess) -> NavigationDecision {
        match access {
            RouteAccess::Public => NavigationDecision::Allow,
            RouteAccess::RequiresAuth if snapshot.is_authenticated() => NavigationDecision::Allow,
            RouteAccess::RequiresAuth => NavigationDecision::Redirect {
                to: self.login_route.clone(),
                reason: if snapshot.expired {
                    RedirectReason::SessionExpired
                } else {
                    RedirectReason::LoginRequired
                },
            },
            RouteAccess::GuestOnly if snapshot.is_authenticated() => NavigationDecision::Redirect {
                to: self.home_route.clone(),
                reason: RedirectReason::AlreadyAuthenticated,
            },
            RouteAccess::GuestOnly => NavigationDecision::Allow,
        }
    }
}
