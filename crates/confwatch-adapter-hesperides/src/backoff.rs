//! Capped exponential backoff for establishing a connection.
//!
//! The first attempt runs immediately. After each failure the caller
//! sleeps `initial`, then `2·initial`, `4·initial`, ... and retries; once
//! the next delay would reach `ceiling` the last error is returned. With
//! the defaults that is six attempts separated by 1, 2, 4, 8 and 16 s.
//! Attempts are sequential and there is no jitter.

use crate::client::{ClientError, HesperidesClient};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Backoff schedule used while connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry
    pub initial: Duration,
    /// Delays reaching this bound are never slept; retrying stops instead
    pub ceiling: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            ceiling: Duration::from_secs(20),
        }
    }
}

impl BackoffPolicy {
    /// The doubling delay sequence, stopping below the ceiling.
    ///
    /// A zero `initial` delay yields no retries at all.
    #[must_use]
    pub fn delays(&self) -> Delays {
        Delays {
            next: Some(self.initial),
            ceiling: self.ceiling,
        }
    }

    /// Total attempts made before giving up: one per delay plus the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        u32::try_from(self.delays().count())
            .unwrap_or(u32::MAX)
            .saturating_add(1)
    }
}

/// Iterator over the delays of a [`BackoffPolicy`].
#[derive(Debug, Clone)]
pub struct Delays {
    next: Option<Duration>,
    ceiling: Duration,
}

impl Iterator for Delays {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next.take()?;
        if current.is_zero() || current >= self.ceiling {
            return None;
        }
        self.next = current.checked_mul(2);
        Some(current)
    }
}

/// Run `op` until it succeeds or `policy` runs out of delays.
///
/// # Errors
///
/// Returns the error of the final attempt.
pub async fn retry<T, E, F, Fut>(policy: &BackoffPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut delays = policy.delays();
    let mut attempt: u32 = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let Some(delay) = delays.next() else {
                    return Err(err);
                };
                tracing::warn!(attempt, error = %err, retry_in = ?delay, "Attempt failed, backing off");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

impl HesperidesClient {
    /// Probe the endpoint until it answers, following the configured
    /// backoff policy.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Unreachable`] carrying the last probe error
    /// once the policy is exhausted.
    pub async fn establish(&self) -> Result<(), ClientError> {
        let policy = self.config().backoff;

        retry(&policy, || self.probe())
            .await
            .map_err(|last| ClientError::Unreachable {
                attempts: policy.max_attempts(),
                last: Box::new(last),
            })?;

        tracing::debug!(
            base_url = self.config().endpoint.base_url(),
            "Connected to Hesperides"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HesperidesConfig;
    use confwatch_core::Endpoint;
    use mockito::{Server, ServerGuard};
    use tokio::time::Instant;

    fn secs(values: &[u64]) -> Vec<Duration> {
        values.iter().copied().map(Duration::from_secs).collect()
    }

    #[test]
    fn default_delays_double_below_ceiling() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delays().collect::<Vec<_>>(), secs(&[1, 2, 4, 8, 16]));
        assert_eq!(policy.max_attempts(), 6);
    }

    #[test]
    fn delay_equal_to_ceiling_is_not_slept() {
        let policy = BackoffPolicy {
            initial: Duration::from_secs(5),
            ceiling: Duration::from_secs(20),
        };
        assert_eq!(policy.delays().collect::<Vec<_>>(), secs(&[5, 10]));
    }

    #[test]
    fn zero_initial_means_single_attempt() {
        let policy = BackoffPolicy {
            initial: Duration::ZERO,
            ceiling: Duration::from_secs(20),
        };
        assert_eq!(policy.delays().count(), 0);
        assert_eq!(policy.max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_succeeds_after_failures() {
        let start = Instant::now();
        let mut calls = 0;

        let result = retry(&BackoffPolicy::default(), || {
            calls += 1;
            let attempt = calls;
            async move {
                if attempt <= 3 {
                    Err(format!("attempt {attempt} failed"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(4));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(7), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(8), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn retry_gives_up_with_last_error() {
        let start = Instant::now();
        let mut calls = 0;

        let result: Result<(), String> = retry(&BackoffPolicy::default(), || {
            calls += 1;
            let attempt = calls;
            async move { Err(format!("attempt {attempt} failed")) }
        })
        .await;

        assert_eq!(result, Err("attempt 6 failed".to_string()));
        assert_eq!(calls, 6);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(31), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(32), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn retry_first_success_does_not_sleep() {
        let start = Instant::now();
        let result: Result<u8, String> = retry(&BackoffPolicy::default(), || async { Ok(1) }).await;
        assert_eq!(result, Ok(1));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    fn fast_config(server: &ServerGuard) -> HesperidesConfig {
        let endpoint = Endpoint::new(&server.url(), "user", "secret", "app", "plat").unwrap();
        HesperidesConfig {
            backoff: BackoffPolicy {
                initial: Duration::from_millis(10),
                ceiling: Duration::from_millis(40),
            },
            ..HesperidesConfig::new(endpoint)
        }
    }

    #[tokio::test]
    async fn connect_probes_versions() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/versions")
            .match_header("authorization", "Basic dXNlcjpzZWNyZXQ=")
            .with_status(200)
            .with_body(r#"{"backend_version":"4.3"}"#)
            .expect(1)
            .create_async()
            .await;

        HesperidesClient::connect(fast_config(&server)).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn connect_gives_up_after_policy() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/versions")
            .with_status(503)
            .with_body("starting")
            .expect(3)
            .create_async()
            .await;

        let err = HesperidesClient::connect(fast_config(&server))
            .await
            .unwrap_err();

        match err {
            ClientError::Unreachable { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, ClientError::Api { status: 503, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        mock.assert_async().await;
    }
}
