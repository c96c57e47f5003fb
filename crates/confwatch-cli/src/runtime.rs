//! Watch loop driving a store the way a templating engine does.

use crate::config::CliConfig;
use anyhow::{Context, Result};
use confwatch_adapter_hesperides::HesperidesClient;
use confwatch_core::{StoreClient, ValueMap, INITIAL_VERSION};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// Connect, then print values until Ctrl+C (or once, in one-time mode).
///
/// # Errors
///
/// Returns error if the configuration is invalid, the endpoint never
/// becomes reachable, or a watch or fetch fails.
pub async fn run(config: CliConfig) -> Result<()> {
    let client = HesperidesClient::connect(config.client_config()?)
        .await
        .context("Failed to connect to Hesperides")?;

    tracing::info!(
        app = %config.app,
        platform = %config.platform,
        prefix = %config.prefix,
        "Connected, watching for changes"
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            shutdown.cancel();
        }
    });

    watch_loop(
        &client,
        &config.prefix,
        &config.keys,
        config.onetime,
        &cancel,
        print_values,
    )
    .await?;

    tracing::info!("confwatch stopped");
    Ok(())
}

/// Fetch and emit values each time the store reports a new version.
async fn watch_loop<S: StoreClient>(
    store: &S,
    prefix: &str,
    keys: &[String],
    onetime: bool,
    cancel: &CancellationToken,
    mut emit: impl FnMut(&ValueMap) -> Result<()>,
) -> Result<()> {
    let mut token = INITIAL_VERSION;

    loop {
        let next = store
            .watch_prefix(prefix, keys, token, cancel)
            .await
            .context("Watch failed")?;

        if cancel.is_cancelled() {
            return Ok(());
        }

        if next != token {
            tracing::debug!(previous = token, version = next, "Store changed");
            let values = store
                .get_values(prefix, keys)
                .await
                .context("Failed to fetch values")?;
            emit(&values)?;
            token = next;
        }

        if onetime {
            return Ok(());
        }
    }
}

fn print_values(values: &ValueMap) -> Result<()> {
    let sorted: BTreeMap<&String, &String> = values.iter().collect();
    let line = serde_json::to_string(&sorted).context("Failed to encode values")?;
    println!("{line}");
    Ok(())
}
