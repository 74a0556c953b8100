//! # Gatehouse Core
//!
//! Client-side authenticated session lifecycle.
//!
//! This crate provides:
//! - A session state machine with startup probe, login, and logout
//! - Single-flight credential renewal and a bounded-retry request guard
//! - Identity isolation for caches owned by other subsystems
//! - Navigation decisions that wait for session initialization
//!
//! The transport is abstracted behind [`AuthBoundary`]; `gatehouse-http`
//! provides the HTTP implementation.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gatehouse_core::{AuthBoundary, LoginCredentials, SessionContext, SessionManager};
//! use std::sync::Arc;
//!
//! async fn sign_in(boundary: Arc<dyn AuthBoundary>) -> Result<(), gatehouse_core::GatehouseError> {
//!     let session = SessionManager::new(boundary, SessionContext::default());
//!     session.startup_probe().await;
//!     if !session.is_authenticated() {
//!         session.login(&LoginCredentials::new("anna@example.com", "secret")).await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod boundary;
pub mod cache;
pub mod context;
pub mod dependents;
pub mod error;
pub mod events;
pub mod guard;
pub mod model;
pub mod navigation;
pub mod refresh;
pub mod session;
pub mod store;

// Re-export commonly used types at crate root
pub use model::{
    AccountType,
    LoginCredentials,
    RegisteredUser,
    RegistrationRequest,
    SessionSnapshot,
    SessionStatus,
    UserId,
    UserProfile,
};

pub use store::{
    CredentialStore,
    IdentityStorage,
    MemoryIdentityStorage,
    Secret,
    StorageError,
};

#[cfg(feature = "file-storage")]
pub use store::FileIdentityStorage;

pub use boundary::{AuthBoundary, AuthError, LoginGrant, RefreshGrant};

pub use cache::ScopedCache;
pub use context::SessionContext;
pub use dependents::{DependentCache, DependentStateCoordinator};
pub use error::GatehouseError;
pub use events::AuthEvent;
pub use guard::{GuardError, RequestGuard};
pub use navigation::{NavigationDecision, NavigationGuard, RedirectReason, RouteAccess};
pub use refresh::{RefreshCoordinator, RefreshFailed, TicketState};
pub use session::SessionManager;
