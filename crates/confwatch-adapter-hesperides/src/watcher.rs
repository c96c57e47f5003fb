//! Version-polling change watch.
//!
//! A watch spawns a task that polls the platform `version_id` and hands
//! the first differing version back over a oneshot channel. The caller
//! races that hand-off against its cancellation token.
//!
//! The task runs under a child of the caller's token, so cancelling the
//! caller (or dropping the watch future) also stops the poll loop at its
//! next request or sleep.

use crate::client::{ClientError, HesperidesClient};
use confwatch_core::{FIRST_VERSION, INITIAL_VERSION};
use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

impl HesperidesClient {
    /// Wait until the platform version differs from `last`.
    ///
    /// `prefix` and `keys` do not narrow the watch: the version is tracked
    /// per platform. A `last` of [`INITIAL_VERSION`] returns
    /// [`FIRST_VERSION`] at once so the caller performs its first fetch.
    /// When `cancel` fires, `last` is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns the first poll error that is not a timeout, including
    /// undecodable bodies and malformed `version_id` values.
    pub async fn watch_prefix(
        &self,
        prefix: &str,
        keys: &[String],
        last: u64,
        cancel: &CancellationToken,
    ) -> Result<u64, ClientError> {
        if last == INITIAL_VERSION {
            return Ok(FIRST_VERSION);
        }

        tracing::debug!(prefix, keys = keys.len(), last, "Watching platform version");

        let loop_token = cancel.child_token();
        let (tx, rx) = oneshot::channel();

        let client = self.clone();
        let task_token = loop_token.clone();
        tokio::spawn(async move {
            let interval = client.config().poll_interval;
            let outcome =
                poll_until_changed(|| client.platform_version(), last, interval, &task_token).await;
            if let Some(outcome) = outcome.transpose() {
                // The caller may already have given up.
                let _ = tx.send(outcome);
            }
        });

        let _stop_on_exit = loop_token.drop_guard();

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(last, "Watch cancelled");
                Ok(last)
            }
            outcome = rx => match outcome {
                Ok(outcome) => outcome,
                Err(_) => Err(ClientError::WatchAborted),
            },
        }
    }
}

/// Poll until a version other than `last` shows up.
///
/// Timeouts are retried immediately. An unchanged version waits `interval`
/// before the next poll. A remote version of [`INITIAL_VERSION`] counts as
/// unchanged, so the "nothing observed" token is never handed back.
/// Returns `Ok(None)` once `cancel` fires; no poll is issued after that.
async fn poll_until_changed<F, Fut>(
    mut poll: F,
    last: u64,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<Option<u64>, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<u64, ClientError>>,
{
    loop {
        if cancel.is_cancelled() {
            return Ok(None);
        }

        let polled = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(None),
            polled = poll() => polled,
        };

        match polled {
            Ok(version) if version != last && version != INITIAL_VERSION => {
                tracing::debug!(last, version, "Platform version changed");
                return Ok(Some(version));
            }
            Ok(version) => {
                tracing::trace!(version, "Platform version unchanged");
            }
            Err(err) if err.is_timeout() => {
                tracing::debug!(error = %err, "Version poll timed out, retrying");
                continue;
            }
            Err(err) => return Err(err),
        }

        if !interval.is_zero() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(None),
                () = tokio::time::sleep(interval) => {}
            }
        }
    }
}
