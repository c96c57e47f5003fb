//! Remote endpoint configuration.
//!
//! An adapter instance is bound to exactly one endpoint for its whole
//! lifetime. Engines hand over a list of node URLs; anything other than a
//! single, well-formed http(s) URL is rejected before any network access.

use std::fmt;
use url::Url;

/// Connection parameters for a remote configuration store.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    base_url: String,
    username: String,
    password: String,
    app: String,
    platform: String,
}

impl Endpoint {
    /// Create an endpoint from a single base URL.
    ///
    /// A trailing `/` is trimmed so that resource paths can be appended
    /// verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::InvalidUrl`] if `base_url` is not an
    /// absolute http or https URL.
    pub fn new(
        base_url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        app: impl Into<String>,
        platform: impl Into<String>,
    ) -> Result<Self, EndpointError> {
        let parsed =
            Url::parse(base_url).map_err(|e| EndpointError::InvalidUrl(format!("{base_url}: {e}")))?;

        match parsed.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(EndpointError::InvalidUrl(format!(
                    "{base_url}: unsupported scheme '{scheme}'"
                )));
            }
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            app: app.into(),
            platform: platform.into(),
        })
    }

    /// Create an endpoint from the node list supplied by the engine.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::Missing`] for an empty list,
    /// [`EndpointError::Multiple`] when more than one node is given, and
    /// [`EndpointError::InvalidUrl`] if the single node is malformed.
    pub fn from_nodes<S: AsRef<str>>(
        nodes: &[S],
        username: impl Into<String>,
        password: impl Into<String>,
        app: impl Into<String>,
        platform: impl Into<String>,
    ) -> Result<Self, EndpointError> {
        match nodes {
            [] => Err(EndpointError::Missing),
            [node] => Self::new(node.as_ref(), username, password, app, platform),
            _ => Err(EndpointError::Multiple(nodes.len())),
        }
    }

    /// Base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Basic auth user name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Basic auth password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Application identifier.
    #[must_use]
    pub fn app(&self) -> &str {
        &self.app
    }

    /// Platform identifier within the application.
    #[must_use]
    pub fn platform(&self) -> &str {
        &self.platform
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("app", &self.app)
            .field("platform", &self.platform)
            .finish()
    }
}

/// Errors raised while validating endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    /// No node was supplied
    #[error("an endpoint is required as a node argument")]
    Missing,
    /// More than one node was supplied
    #[error("a single endpoint must be provided as node argument, got {0}")]
    Multiple(usize),
    /// The node is not a usable http(s) URL
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(String),
}
