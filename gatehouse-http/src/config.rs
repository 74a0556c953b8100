//! Boundary configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Where and how to reach the authentication service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpBoundaryConfig {
    /// Root of the service. Endpoint paths are resolved against it.
    pub base_url: String,

    /// Per-request timeout in milliseconds. A timeout is a network failure.
    pub timeout_ms: u64,

    /// Cookie that carries the refresh credential.
    pub refresh_cookie: String,

    /// Cookie that carries the access credential.
    pub access_cookie: String,

    pub paths: EndpointPaths,
}

impl HttpBoundaryConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HttpBoundaryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            refresh_cookie: "refresh_token".to_string(),
            access_cookie: "access_token".to_string(),
            paths: EndpointPaths::default(),
        }
    }
}

/// Endpoint paths relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointPaths {
    pub login: String,
    pub logout: String,
    pub profile: String,
    pub refresh: String,
    pub register: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            login: "auth/token".to_string(),
            logout: "auth/logout".to_string(),
            profile: "auth/me".to_string(),
            refresh: "auth/refresh".to_string(),
            register: "auth/register".to_string(),
        }
    }
}
