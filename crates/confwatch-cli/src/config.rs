//! CLI configuration.

use anyhow::{Context, Result};
use confwatch_adapter_hesperides::HesperidesConfig;
use confwatch_core::Endpoint;
use std::path::PathBuf;
use std::time::Duration;

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Hesperides node URLs; exactly one is accepted
    pub nodes: Vec<String>,

    /// Basic auth user name
    pub username: String,

    /// Basic auth password
    pub password: String,

    /// Application identifier
    pub app: String,

    /// Platform identifier
    pub platform: String,

    /// Property path prefix to read
    pub prefix: String,

    /// Keys to print
    pub keys: Vec<String>,

    /// Delay between unchanged version polls
    pub poll_interval: Duration,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Extra root CA (PEM)
    pub ca_cert_path: Option<PathBuf>,

    /// Print once and exit instead of watching
    pub onetime: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            nodes: vec!["http://localhost:8080".to_string()],
            username: String::new(),
            password: String::new(),
            app: String::new(),
            platform: String::new(),
            prefix: "/".to_string(),
            keys: Vec::new(),
            poll_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(10),
            ca_cert_path: None,
            onetime: false,
        }
    }
}

impl CliConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `CONFWATCH_NODES`: comma-separated node URLs
    /// - `CONFWATCH_USERNAME` / `CONFWATCH_PASSWORD`: basic auth credentials
    /// - `CONFWATCH_APP` / `CONFWATCH_PLATFORM`: platform to read
    /// - `CONFWATCH_PREFIX`: property path prefix (default `/`)
    /// - `CONFWATCH_KEYS`: comma-separated keys to print
    /// - `CONFWATCH_POLL_INTERVAL_MS`: delay between unchanged polls
    /// - `CONFWATCH_REQUEST_TIMEOUT_MS`: per-request timeout
    /// - `CONFWATCH_CA_CERT`: extra root CA (PEM)
    /// - `CONFWATCH_ONETIME`: `true`/`1` to print once and exit
    ///
    /// # Errors
    ///
    /// Returns error if a numeric or boolean variable cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(nodes) = lookup("CONFWATCH_NODES") {
            config.nodes = split_list(&nodes);
        }

        if let Some(username) = lookup("CONFWATCH_USERNAME") {
            config.username = username;
        }

        if let Some(password) = lookup("CONFWATCH_PASSWORD") {
            config.password = password;
        }

        if let Some(app) = lookup("CONFWATCH_APP") {
            config.app = app;
        }

        if let Some(platform) = lookup("CONFWATCH_PLATFORM") {
            config.platform = platform;
        }

        if let Some(prefix) = lookup("CONFWATCH_PREFIX") {
            config.prefix = prefix;
        }

        if let Some(keys) = lookup("CONFWATCH_KEYS") {
            config.keys = split_list(&keys);
        }

        if let Some(ms) = lookup("CONFWATCH_POLL_INTERVAL_MS") {
            config.poll_interval = Duration::from_millis(
                ms.parse().context("Invalid CONFWATCH_POLL_INTERVAL_MS")?,
            );
        }

        if let Some(ms) = lookup("CONFWATCH_REQUEST_TIMEOUT_MS") {
            config.request_timeout = Duration::from_millis(
                ms.parse().context("Invalid CONFWATCH_REQUEST_TIMEOUT_MS")?,
            );
        }

        if let Some(path) = lookup("CONFWATCH_CA_CERT") {
            config.ca_cert_path = Some(PathBuf::from(path));
        }

        if let Some(flag) = lookup("CONFWATCH_ONETIME") {
            config.onetime = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                other => anyhow::bail!("Invalid CONFWATCH_ONETIME: {other}"),
            };
        }

        Ok(config)
    }

    /// Build the adapter configuration.
    ///
    /// # Errors
    ///
    /// Returns error unless exactly one valid node URL is configured.
    pub fn client_config(&self) -> Result<HesperidesConfig> {
        let endpoint = Endpoint::from_nodes(
            self.nodes.as_slice(),
            self.username.as_str(),
            self.password.as_str(),
            self.app.as_str(),
            self.platform.as_str(),
        )
        .context("Invalid CONFWATCH_NODES")?;

        Ok(HesperidesConfig {
            request_timeout: self.request_timeout,
            poll_interval: self.poll_interval,
            ca_cert_path: self.ca_cert_path.clone(),
            ..HesperidesConfig::new(endpoint)
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<CliConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        CliConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = load(&[]).unwrap();
        assert_eq!(config.nodes, vec!["http://localhost:8080"]);
        assert_eq!(config.prefix, "/");
        assert!(config.keys.is_empty());
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert!(!config.onetime);
    }

    #[test]
    fn reads_lists_and_durations() {
        let config = load(&[
            ("CONFWATCH_NODES", "https://hesperides.example.com"),
            ("CONFWATCH_KEYS", "db.url, db.user,,"),
            ("CONFWATCH_POLL_INTERVAL_MS", "250"),
            ("CONFWATCH_ONETIME", "true"),
        ])
        .unwrap();

        assert_eq!(config.nodes, vec!["https://hesperides.example.com"]);
        assert_eq!(config.keys, vec!["db.url", "db.user"]);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert!(config.onetime);
    }

    #[test]
    fn rejects_bad_numbers_and_flags() {
        assert!(load(&[("CONFWATCH_POLL_INTERVAL_MS", "soon")]).is_err());
        assert!(load(&[("CONFWATCH_ONETIME", "maybe")]).is_err());
    }

    #[test]
    fn client_config_requires_single_node() {
        let config = load(&[("CONFWATCH_NODES", "http://a:8080,http://b:8080")]).unwrap();
        assert!(config.client_config().is_err());

        let config = load(&[
            ("CONFWATCH_NODES", "http://a:8080"),
            ("CONFWATCH_APP", "shop"),
            ("CONFWATCH_REQUEST_TIMEOUT_MS", "500"),
        ])
        .unwrap();
        let client_config = config.client_config().unwrap();
        assert_eq!(client_config.endpoint.app(), "shop");
        assert_eq!(client_config.request_timeout, Duration::from_millis(500));
    }
}
