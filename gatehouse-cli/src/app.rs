//! Session wiring for one CLI invocation.

use anyhow::{Context, Result};
use chrono::Utc;
use gatehouse_core::{
    DependentStateCoordinator, FileIdentityStorage, ScopedCache, SessionContext, SessionManager,
};
use gatehouse_http::{AuthorizedClient, HttpAuthBoundary};
use std::sync::Arc;
use tracing::debug;

use crate::config::CliConfig;
use crate::session_file::{SavedSession, SessionFile};

/// Most recent request paths kept per identity.
const RECENT_LIMIT: usize = 20;

/// A session restored from disk, ready for one command.
pub struct App {
    pub session: SessionManager,
    pub client: AuthorizedClient,
    pub recent: Arc<ScopedCache<Vec<String>>>,
    boundary: HttpAuthBoundary,
    file: SessionFile,
}

impl App {
    /// Restore the saved session and resolve it with the startup probe.
    pub async fn open(config: &CliConfig) -> Result<Self> {
        let storage = Arc::new(FileIdentityStorage::new(config.identities_dir()));
        let coordinator = DependentStateCoordinator::with_storage(storage.clone());
        let recent = Arc::new(ScopedCache::persistent("recent-requests", storage));
        coordinator.register(recent.clone());

        let context = SessionContext::new(coordinator);
        let boundary = HttpAuthBoundary::new(config.boundary.clone())
            .context("Failed to create HTTP client")?
            .with_session(context.clone());

        let file = SessionFile::new(config.session_path());
        if let Some(saved) = file.load()? {
            if let Some(cookies) = &saved.cookies {
                boundary.restore_cookies(cookies);
            }
            if let Some(credential) = saved.credential {
                context.credentials().set(credential);
            }
        }

        let client = AuthorizedClient::new(boundary.clone());
        let session = SessionManager::new(Arc::new(boundary.clone()), context);
        let status = session.startup_probe().await;
        debug!(status = %status, "session restored");

        Ok(Self {
            session,
            client,
            recent,
            boundary,
            file,
        })
    }

    /// Remember a request path for the signed-in identity.
    pub async fn record_request(&self, path: &str) -> Result<()> {
        self.recent
            .update(|paths| {
                paths.retain(|p| p != path);
                paths.insert(0, path.to_string());
                paths.truncate(RECENT_LIMIT);
            })
            .await
            .context("Failed to record request")
    }

    /// Persist whatever the session holds now.
    pub fn close(self) -> Result<()> {
        let credential = if self.session.is_authenticated() {
            self.session.context().credentials().get()
        } else {
            None
        };

        self.file.save(&SavedSession {
            cookies: self.boundary.cookie_header(),
            credential,
            saved_at: Utc::now(),
        })
    }
}
