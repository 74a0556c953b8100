//! Gatehouse HTTP Boundary
//!
//! An [`AuthBoundary`](gatehouse_core::AuthBoundary) implementation for
//! cookie-based authentication services, plus a client for authenticated
//! business requests that share the same session.
//!
//! # Overview
//!
//! The service issues its credentials as cookies. [`HttpAuthBoundary`] keeps
//! them in a cookie jar, so the session core never handles the refresh
//! credential directly; it only asks whether a marker cookie is present.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | login     | `POST auth/token`, form fields `username`, `password` |
//! | logout    | `POST auth/logout` |
//! | profile   | `GET auth/me` |
//! | refresh   | `POST auth/refresh` |
//! | register  | `POST auth/register`, JSON body |
//!
//! Paths, base URL, and timeout come from [`HttpBoundaryConfig`].
//!
//! # Quick Start
//!
//! ```no_run
//! use gatehouse_core::{SessionContext, SessionManager};
//! use gatehouse_http::{AuthorizedClient, HttpAuthBoundary, HttpBoundaryConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = SessionContext::default();
//!     let boundary = HttpAuthBoundary::new(HttpBoundaryConfig::default())?
//!         .with_session(context.clone());
//!     let client = AuthorizedClient::new(boundary.clone());
//!     let session = SessionManager::new(Arc::new(boundary), context);
//!
//!     session.startup_probe().await;
//!     let accounts: serde_json::Value = client.guarded_get_json(&session, "accounts").await?;
//!     println!("{}", accounts);
//!     Ok(())
//! }
//! ```
//!
//! # Error mapping
//!
//! Non-success statuses become [`AuthError`](gatehouse_core::AuthError) via
//! `AuthError::from_status`, with the server's `detail` field (a message or a
//! list of `{msg}` objects) preserved. Timeouts and connection failures are
//! `NetworkFailure`.

mod boundary;
mod client;
pub mod config;
pub mod response;

pub use boundary::{HttpAuthBoundary, HttpBoundaryError};
pub use client::AuthorizedClient;
pub use config::{EndpointPaths, HttpBoundaryConfig};
