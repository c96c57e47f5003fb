//! # confwatch
//!
//! Connects to a Hesperides platform, prints the requested values as JSON,
//! then reprints them every time the platform version changes. Ctrl+C
//! stops the watch.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod config;
mod runtime;

use config::CliConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout only carries values.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting confwatch");

    let config = CliConfig::from_env()?;

    runtime::run(config).await
}
