//! Authenticated business requests.

use gatehouse_core::{AuthError, GuardError, SessionManager};
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::boundary::HttpAuthBoundary;
use crate::response::{check, json, transport_error};

/// Client for business endpoints that share the boundary's session.
///
/// Requests carry the boundary's cookies and, when available, the stored
/// bearer credential. Wrap calls in [`SessionManager::guard`] (or use the
/// `guarded_*` helpers) to renew an expired credential transparently.
#[derive(Clone, Debug)]
pub struct AuthorizedClient {
    boundary: HttpAuthBoundary,
}

impl AuthorizedClient {
    pub fn new(boundary: HttpAuthBoundary) -> Self {
        Self { boundary }
    }

    /// Send a request and decode the JSON response.
    pub async fn request<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, AuthError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.boundary.endpoint(path)?;
        debug!(%method, %url, bearer = self.has_bearer(), "authorized request");

        let mut request = self.boundary.authorize(self.boundary.http().request(method, url));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(transport_error)?;
        json(check(response).await?).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AuthError> {
        self.request::<Value, T>(Method::GET, path, None).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, AuthError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::POST, path, Some(body)).await
    }

    /// `GET` through the session's request guard.
    pub async fn guarded_get_json<T: DeserializeOwned>(
        &self,
        session: &SessionManager,
        path: &str,
    ) -> Result<T, GuardError> {
        session.guard(move || self.get_json::<T>(path)).await
    }

    /// `POST` through the session's request guard.
    pub async fn guarded_post_json<B, T>(
        &self,
        session: &SessionManager,
        path: &str,
        body: &B,
    ) -> Result<T, GuardError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        session.guard(move || self.post_json::<B, T>(path, body)).await
    }

    fn has_bearer(&self) -> bool {
        self.boundary
            .session()
            .is_some_and(|s| s.credentials().has_credential())
    }
}
