//! Authentication events published on identity changes.

use crate::model::{UserId, UserProfile};

/// Identity transition of the session.
///
/// Exactly one event is emitted for every transition that changes the
/// authenticated identity. Profile refreshes that keep the same identity key
/// emit nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    /// Anonymous to identified.
    LoggedIn { profile: UserProfile },

    /// Identified to anonymous through logout.
    LoggedOut,

    /// One identity replaced by another without passing through logout.
    UserSwitched { from: UserId, to: UserProfile },

    /// Identified to anonymous because credential renewal failed.
    RefreshFailed,
}

impl AuthEvent {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoggedIn { .. } => "logged_in",
            Self::LoggedOut => "logged_out",
            Self::UserSwitched { .. } => "user_switched",
            Self::RefreshFailed => "refresh_failed",
        }
    }

    /// Profile of the identity that becomes active, if any.
    pub fn incoming_profile(&self) -> Option<&UserProfile> {
        match self {
            Self::LoggedIn { profile } => Some(profile),
            Self::UserSwitched { to, .. } => Some(to),
            Self::LoggedOut | Self::RefreshFailed => None,
        }
    }
}
