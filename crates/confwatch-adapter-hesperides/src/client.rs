//! HTTP client for the Hesperides REST API.
//!
//! All requests share one connection pool and carry the same `Accept` and
//! basic `Authorization` headers. Any status other than 200 is an error
//! carrying the response body.

use crate::backoff::BackoffPolicy;
use crate::encoding::{basic_auth, properties_path, query_escape};
use confwatch_core::{Endpoint, EndpointError, StoreClient, ValueMap};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Hesperides client configuration.
#[derive(Debug, Clone)]
pub struct HesperidesConfig {
    /// Remote endpoint and credentials
    pub endpoint: Endpoint,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Retry policy applied while connecting
    pub backoff: BackoffPolicy,
    /// Delay between watch polls that observe no change (zero polls back to back)
    pub poll_interval: Duration,
    /// Extra root CA for https endpoints with a private PKI (PEM format)
    pub ca_cert_path: Option<PathBuf>,
}

impl HesperidesConfig {
    /// Configuration with default timings for `endpoint`.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            request_timeout: Duration::from_secs(10),
            backoff: BackoffPolicy::default(),
            poll_interval: Duration::from_secs(1),
            ca_cert_path: None,
        }
    }
}

/// Client for one Hesperides application platform.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct HesperidesClient {
    client: Client,
    config: Arc<HesperidesConfig>,
    authorization: Arc<str>,
}

impl HesperidesClient {
    /// Create a client without touching the network.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created, or if the CA
    /// certificate file cannot be read or parsed.
    pub fn new(config: HesperidesConfig) -> Result<Self, ClientError> {
        let mut builder = Client::builder().timeout(config.request_timeout);

        if let Some(ca_path) = &config.ca_cert_path {
            let ca_cert = fs::read(ca_path).map_err(|e| {
                ClientError::Init(format!(
                    "failed to read CA certificate {}: {e}",
                    ca_path.display()
                ))
            })?;
            let cert = reqwest::Certificate::from_pem(&ca_cert)
                .map_err(|e| ClientError::Init(format!("failed to parse CA certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
            tracing::debug!(ca_path = %ca_path.display(), "Loaded custom CA certificate");
        }

        let client = builder
            .build()
            .map_err(|e| ClientError::Init(e.to_string()))?;
        let authorization = basic_auth(config.endpoint.username(), config.endpoint.password());

        Ok(Self {
            client,
            config: Arc::new(config),
            authorization: authorization.into(),
        })
    }

    /// Create a client and wait until the endpoint answers its probe.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Unreachable`] if the probe never succeeds
    /// within the backoff policy, or any error from [`Self::new`].
    pub async fn connect(config: HesperidesConfig) -> Result<Self, ClientError> {
        let client = Self::new(config)?;
        client.establish().await?;
        Ok(client)
    }

    /// Engine-facing constructor: validate the node list, then connect
    /// with default timings.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] without any network call when
    /// `nodes` does not hold exactly one valid URL, otherwise as
    /// [`Self::connect`].
    pub async fn connect_nodes<S: AsRef<str>>(
        nodes: &[S],
        username: &str,
        password: &str,
        app: &str,
        platform: &str,
    ) -> Result<Self, ClientError> {
        let endpoint = Endpoint::from_nodes(nodes, username, password, app, platform)?;
        Self::connect(HesperidesConfig::new(endpoint)).await
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &HesperidesConfig {
        &self.config
    }

    /// Issue an authenticated GET and return the body of a 200 response.
    async fn get(&self, path: &str) -> Result<String, ClientError> {
        let url = format!("{}{}", self.config.endpoint.base_url(), path);

        tracing::debug!(url, "GET");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, self.authorization.as_ref())
            .send()
            .await
            .map_err(ClientError::from_transport)?;

        let status = response.status();
        let body = response.text().await.map_err(ClientError::from_transport)?;

        if status != StatusCode::OK {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(body)
    }

    fn platform_resource(&self) -> String {
        format!(
            "/rest/applications/{}/platforms/{}",
            query_escape(self.config.endpoint.app()),
            query_escape(self.config.endpoint.platform())
        )
    }

    /// Check reachability and credentials. The body is ignored.
    ///
    /// # Errors
    ///
    /// Returns error on network or API errors.
    pub async fn probe(&self) -> Result<(), ClientError> {
        self.get("/rest/versions").await.map(drop)
    }

    /// Current `version_id` of the platform.
    ///
    /// # Errors
    ///
    /// Returns error on network or API errors, on an undecodable body, or
    /// when `version_id` is missing or not an unsigned integer.
    pub async fn platform_version(&self) -> Result<u64, ClientError> {
        let body = self.get(&self.platform_resource()).await?;
        let platform: Value =
            serde_json::from_str(&body).map_err(|e| ClientError::Parse(e.to_string()))?;
        parse_version(&platform)
    }

    /// Fetch the requested `keys` stored under `prefix`.
    ///
    /// Requested keys missing remotely map to `""`; remote keys that were
    /// not requested are dropped. No retry is attempted.
    ///
    /// # Errors
    ///
    /// Returns error on network or API errors, or if the body cannot be
    /// decoded.
    pub async fn get_values(&self, prefix: &str, keys: &[String]) -> Result<ValueMap, ClientError> {
        let path = properties_path(prefix);

        tracing::debug!(prefix, path, keys = keys.len(), "Fetching properties");

        let body = self
            .get(&format!(
                "{}/properties?path={}",
                self.platform_resource(),
                query_escape(&path)
            ))
            .await?;
        let properties: PropertiesResponse =
            serde_json::from_str(&body).map_err(|e| ClientError::Parse(e.to_string()))?;

        Ok(select_keys(properties.key_value_properties, keys))
    }
}

impl fmt::Debug for HesperidesClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HesperidesClient")
            .field("config", &self.config)
            .field("authorization", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl StoreClient for HesperidesClient {
    type Error = ClientError;

    fn get_values(
        &self,
        prefix: &str,
        keys: &[String],
    ) -> impl Future<Output = Result<ValueMap, ClientError>> + Send {
        HesperidesClient::get_values(self, prefix, keys)
    }

    fn watch_prefix(
        &self,
        prefix: &str,
        keys: &[String],
        last: u64,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<u64, ClientError>> + Send {
        HesperidesClient::watch_prefix(self, prefix, keys, last, cancel)
    }
}

#[derive(Debug, Deserialize)]
struct PropertiesResponse {
    #[serde(default)]
    key_value_properties: Vec<KeyValue>,
}

#[derive(Debug, Deserialize)]
struct KeyValue {
    #[serde(alias = "Name")]
    name: String,
    #[serde(alias = "Value", default)]
    value: String,
}

/// Keep only the requested keys, defaulting absent ones to `""`.
fn select_keys(properties: Vec<KeyValue>, keys: &[String]) -> ValueMap {
    let mut remote: HashMap<String, String> = properties
        .into_iter()
        .map(|kv| (kv.name, kv.value))
        .collect();

    keys.iter()
        .map(|key| (key.clone(), remote.remove(key).unwrap_or_default()))
        .collect()
}

/// Extract `version_id`, accepting a string-encoded or plain integer.
fn parse_version(platform: &Value) -> Result<u64, ClientError> {
    match platform.get("version_id") {
        Some(Value::String(raw)) => raw
            .trim()
            .parse()
            .map_err(|_| ClientError::InvalidVersion(raw.clone())),
        Some(Value::Number(number)) => number
            .as_u64()
            .ok_or_else(|| ClientError::InvalidVersion(number.to_string())),
        Some(other) => Err(ClientError::InvalidVersion(other.to_string())),
        None => Err(ClientError::InvalidVersion("missing version_id".to_string())),
    }
}

/// Errors that can occur with the Hesperides client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// Endpoint configuration was rejected
    #[error(transparent)]
    Config(#[from] EndpointError),
    /// Client initialization failed
    #[error("client init error: {0}")]
    Init(String),
    /// Request exceeded its timeout
    #[error("request timed out: {0}")]
    Timeout(String),
    /// HTTP request failed
    #[error("request error: {0}")]
    Request(String),
    /// API returned a status other than 200
    #[error("HTTP error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },
    /// Response parsing failed
    #[error("parse error: {0}")]
    Parse(String),
    /// `version_id` is missing or not an unsigned integer
    #[error("invalid version_id: {0}")]
    InvalidVersion(String),
    /// The probe kept failing until the backoff policy gave up
    #[error("endpoint unreachable after {attempts} attempts: {last}")]
    Unreachable {
        /// Number of probes issued
        attempts: u32,
        /// Error of the final probe
        last: Box<ClientError>,
    },
    /// The background watch task ended without reporting a result
    #[error("watch task ended without a result")]
    WatchAborted,
}

impl ClientError {
    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }

    /// Whether the failure was a transport timeout. Watches retry these.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
