//! Endpoint configuration.
//!
//! An [`EndpointConfig`] is built once, validated, and then shared read-only by
//! every exchange. There is no ambient or process-global client.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::RestError;

/// Default timeout applied to every exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Base URL, bearer credential and request timeout for one remote API.
#[derive(Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    base_url: String,
    token: String,
    timeout: Duration,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    base_url: String,
    token: String,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

impl EndpointConfig {
    /// Create a configuration with the default timeout.
    ///
    /// The base URL must be an absolute `http` or `https` URL; trailing slashes
    /// are removed. The token must not be empty.
    pub fn new(base_url: impl AsRef<str>, token: impl Into<String>) -> Result<Self, RestError> {
        let base_url = base_url.as_ref().trim().trim_end_matches('/').to_string();
        let parsed = Url::parse(&base_url)
            .map_err(|e| RestError::Configuration(format!("invalid base URL '{}': {}", base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RestError::Configuration(format!(
                "unsupported URL scheme '{}'",
                parsed.scheme()
            )));
        }

        let token = token.into();
        if token.trim().is_empty() {
            return Err(RestError::Configuration("bearer token is empty".to_string()));
        }

        Ok(Self {
            base_url,
            token,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Build a configuration from a JSON object of the form
    /// `{"base_url": "...", "token": "...", "timeout_secs": 30}`.
    pub fn from_value(value: serde_json::Value) -> Result<Self, RestError> {
        let raw: RawConfig = serde_json::from_value(value)
            .map_err(|e| RestError::Configuration(e.to_string()))?;
        let config = Self::new(raw.base_url, raw.token)?;
        match raw.timeout_secs {
            Some(secs) => config.with_timeout(Duration::from_secs(secs)),
            None => Ok(config),
        }
    }

    /// Replace the request timeout. A zero timeout is rejected.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, RestError> {
        if timeout.is_zero() {
            return Err(RestError::Configuration("timeout must be positive".to_string()));
        }
        self.timeout = timeout;
        Ok(self)
    }

    /// The normalized base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The bearer credential.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The timeout applied to every exchange.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve a request path against the base URL.
    ///
    /// Absolute `http(s)` URLs are returned unchanged; anything else is joined
    /// to the base URL with exactly one separating slash. A trailing slash on
    /// the path is kept.
    pub fn resolve(&self, path: &str) -> Result<Url, RestError> {
        let full = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        };
        Url::parse(&full).map_err(|e| RestError::Configuration(format!("invalid URL '{}': {}", full, e)))
    }

    /// Resolve a server-issued link against the base URL.
    ///
    /// A link starting with `/` is relative to the origin, not to the base
    /// path, so `/v2/tags` under `https://host/api` becomes
    /// `https://host/v2/tags`.
    pub fn resolve_link(&self, link: &str) -> Result<Url, RestError> {
        Url::parse(&self.base_url)
            .and_then(|base| base.join(link))
            .map_err(|e| RestError::InvalidNextLink(format!("{}: {}", link, e)))
    }

    /// Whether `url` points at the same origin as the base URL.
    pub fn owns(&self, url: &Url) -> bool {
        Url::parse(&self.base_url)
            .map(|base| base.origin() == url.origin())
            .unwrap_or(false)
    }
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}
