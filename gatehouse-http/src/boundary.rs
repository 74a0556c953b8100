//! [`AuthBoundary`] over HTTP with a cookie-carrying client.

use async_trait::async_trait;
use gatehouse_core::{
    AuthBoundary, AuthError, LoginCredentials, LoginGrant, RefreshGrant, RegisteredUser,
    RegistrationRequest, Secret, SessionContext, UserProfile,
};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::config::HttpBoundaryConfig;
use crate::response::{check, json, json_or_default, transport_error};

/// Failure to construct the HTTP boundary.
#[derive(Debug, Error)]
pub enum HttpBoundaryError {
    #[error("invalid base URL {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Body of a successful login or renewal. Both fields are optional: with a
/// cookie-managed session the body may carry neither.
#[derive(Debug, Default, Deserialize)]
struct TokenBody {
    access_token: Option<String>,
    user: Option<UserProfile>,
}

/// HTTP transport for the session core.
///
/// Credentials set by the server as cookies are kept in the client's jar and
/// sent back automatically. A credential returned in a response body is also
/// sent as a bearer header once a [`SessionContext`] is attached.
///
/// # Example
///
/// ```no_run
/// use gatehouse_core::{SessionContext, SessionManager};
/// use gatehouse_http::{HttpAuthBoundary, HttpBoundaryConfig};
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), gatehouse_http::HttpBoundaryError> {
/// let context = SessionContext::default();
/// let boundary = HttpAuthBoundary::new(HttpBoundaryConfig::default())?
///     .with_session(context.clone());
/// let session = SessionManager::new(Arc::new(boundary), context);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct HttpAuthBoundary {
    config: HttpBoundaryConfig,
    base: Url,
    http: Client,
    jar: Arc<Jar>,
    session: Option<SessionContext>,
}

impl HttpAuthBoundary {
    /// Create a boundary with an empty cookie jar.
    pub fn new(config: HttpBoundaryConfig) -> Result<Self, HttpBoundaryError> {
        Self::with_jar(config, Arc::new(Jar::default()))
    }

    /// Create a boundary over an existing cookie jar.
    pub fn with_jar(config: HttpBoundaryConfig, jar: Arc<Jar>) -> Result<Self, HttpBoundaryError> {
        let base = parse_base(&config.base_url)?;
        let http = Client::builder()
            .cookie_provider(jar.clone())
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            config,
            base,
            http,
            jar,
            session: None,
        })
    }

    /// Send the stored access credential as a bearer header.
    pub fn with_session(mut self, context: SessionContext) -> Self {
        self.session = Some(context);
        self
    }

    pub fn config(&self) -> &HttpBoundaryConfig {
        &self.config
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Cookies the jar would send to the service, as a `Cookie` header value.
    pub fn cookie_header(&self) -> Option<String> {
        self.jar
            .cookies(&self.base)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }

    /// Put previously saved cookies back into the jar.
    pub fn restore_cookies(&self, header: &str) {
        for pair in header.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            self.jar.add_cookie_str(pair, &self.base);
        }
        debug!("session cookies restored");
    }

    /// Drop the credential cookies locally, whatever the server did.
    pub fn forget_cookies(&self) {
        for name in [&self.config.access_cookie, &self.config.refresh_cookie] {
            self.jar
                .add_cookie_str(&format!("{}=; Max-Age=0; Path=/", name), &self.base);
        }
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub(crate) fn session(&self) -> Option<&SessionContext> {
        self.session.as_ref()
    }

    /// Resolve a path against the base URL.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| AuthError::Unexpected {
                status: 0,
                detail: Some(format!("invalid endpoint path {:?}: {}", path, e)),
            })
    }

    /// Attach the bearer credential, if one is stored.
    pub(crate) fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.as_ref().and_then(|s| s.credentials().get()) {
            Some(credential) => request.bearer_auth(credential.expose()),
            None => request,
        }
    }

    fn has_cookie(&self, name: &str) -> bool {
        self.cookie_header().is_some_and(|header| {
            header
                .split(';')
                .filter_map(|pair| pair.trim().split_once('='))
                .any(|(key, value)| key == name && !value.is_empty())
        })
    }
}

#[async_trait]
impl AuthBoundary for HttpAuthBoundary {
    async fn login(&self, credentials: &LoginCredentials) -> Result<LoginGrant, AuthError> {
        let url = self.endpoint(&self.config.paths.login)?;
        let form = [
            ("username", credentials.identifier.as_str()),
            ("password", credentials.secret.expose()),
        ];

        let response = self
            .http
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(transport_error)?;
        let body: TokenBody = json_or_default(check(response).await?).await?;

        info!(identifier = %credentials.identifier, "login accepted");
        Ok(LoginGrant {
            profile: body.user,
            credential: body.access_token.map(Secret::new),
        })
    }

    async fn logout(&self) -> Result<(), AuthError> {
        let url = self.endpoint(&self.config.paths.logout)?;
        let result = match self.authorize(self.http.post(url)).send().await {
            Ok(response) => check(response).await.map(|_| ()),
            Err(e) => Err(transport_error(e)),
        };
        self.forget_cookies();
        result
    }

    async fn get_profile(&self) -> Result<UserProfile, AuthError> {
        let url = self.endpoint(&self.config.paths.profile)?;
        let response = self
            .authorize(self.http.get(url))
            .send()
            .await
            .map_err(transport_error)?;
        json(check(response).await?).await
    }

    async fn refresh(&self) -> Result<RefreshGrant, AuthError> {
        let url = self.endpoint(&self.config.paths.refresh)?;
        let response = self
            .http
            .post(url)
            .send()
            .await
            .map_err(transport_error)?;
        let body: TokenBody = json_or_default(check(response).await?).await?;

        Ok(RefreshGrant {
            credential: body.access_token.map(Secret::new),
        })
    }

    /// A credential cookie, or a stored bearer credential, marks a session
    /// worth probing.
    fn has_refresh_marker(&self) -> bool {
        self.has_cookie(&self.config.refresh_cookie)
            || self.has_cookie(&self.config.access_cookie)
            || self
                .session
                .as_ref()
                .is_some_and(|s| s.credentials().has_credential())
    }

    fn forget(&self) {
        self.forget_cookies();
        debug!("session cookies forgotten");
    }

    async fn register(&self, request: &RegistrationRequest) -> Result<RegisteredUser, AuthError> {
        let url = self.endpoint(&self.config.paths.register)?;
        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;
        json(check(response).await?).await
    }
}

impl std::fmt::Debug for HttpAuthBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAuthBoundary")
            .field("base", &self.base.as_str())
            .field("timeout", &self.config.timeout())
            .field("bearer", &self.session.is_some())
            .finish()
    }
}

/// Parse the base URL so that relative endpoint paths append to it.
fn parse_base(raw: &str) -> Result<Url, HttpBoundaryError> {
    let mut base = Url::parse(raw).map_err(|source| HttpBoundaryError::InvalidBaseUrl {
        url: raw.to_string(),
        source,
    })?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boundary(base: &str) -> HttpAuthBoundary {
        HttpAuthBoundary::new(HttpBoundaryConfig::new(base)).unwrap()
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let boundary = boundary("https://bank.example.com/api");

        assert_eq!(
            boundary.endpoint("auth/me").unwrap().as_str(),
            "https://bank.example.com/api/auth/me"
        );
        assert_eq!(
            boundary.endpoint("/auth/token").unwrap().as_str(),
            "https://bank.example.com/api/auth/token"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = HttpAuthBoundary::new(HttpBoundaryConfig::new("not a url"));
        assert!(matches!(result, Err(HttpBoundaryError::InvalidBaseUrl { .. })));
    }

    #[test]
    fn test_marker_from_restored_cookies() {
        let boundary = boundary("http://localhost:8000");
        assert!(!boundary.has_refresh_marker());

        boundary.restore_cookies("refresh_token=r-1; theme=dark");

        assert!(boundary.has_refresh_marker());
        assert!(boundary.cookie_header().unwrap().contains("refresh_token=r-1"));
    }

    #[test]
    fn test_forget_cookies_clears_marker() {
        let boundary = boundary("http://localhost:8000");
        boundary.restore_cookies("access_token=a-1");
        assert!(boundary.has_refresh_marker());

        boundary.forget_cookies();

        assert!(!boundary.has_refresh_marker());
    }

    #[test]
    fn test_stored_bearer_is_a_marker() {
        let context = SessionContext::default();
        let boundary = boundary("http://localhost:8000").with_session(context.clone());
        assert!(!boundary.has_refresh_marker());

        context.credentials().set(Secret::new("jwt"));

        assert!(boundary.has_refresh_marker());
    }

    #[test]
    fn test_unrelated_cookie_is_not_a_marker() {
        let boundary = boundary("http://localhost:8000");
        boundary.restore_cookies("theme=dark");

        assert!(!boundary.has_refresh_marker());
    }
}
