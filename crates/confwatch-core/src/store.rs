//! Store contract consumed by the templating engine.
//!
//! The engine drives a watch loop: it calls [`StoreClient::watch_prefix`]
//! with the last token it saw, re-renders with [`StoreClient::get_values`]
//! whenever a new token comes back, and repeats.

use std::collections::HashMap;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Requested key name to value. Keys absent from the store map to `""`.
pub type ValueMap = HashMap<String, String>;

/// Token meaning "nothing observed yet".
pub const INITIAL_VERSION: u64 = 0;

/// Token handed back for [`INITIAL_VERSION`] so the engine performs its
/// first fetch without waiting.
pub const FIRST_VERSION: u64 = 1;

/// A remote key/value store exposed through prefix reads and change watches.
pub trait StoreClient: Send + Sync {
    /// Backend error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the requested `keys` below `prefix`.
    ///
    /// Every requested key is present in the result; keys unknown to the
    /// store map to the empty string.
    fn get_values(
        &self,
        prefix: &str,
        keys: &[String],
    ) -> impl Future<Output = Result<ValueMap, Self::Error>> + Send;

    /// Block until the store version differs from `last`, or until
    /// `cancel` fires.
    ///
    /// Returns [`FIRST_VERSION`] immediately when `last` is
    /// [`INITIAL_VERSION`]. On cancellation `last` is returned unchanged.
    fn watch_prefix(
        &self,
        prefix: &str,
        keys: &[String],
        last: u64,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<u64, Self::Error>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use tokio_test::assert_ok;

    #[derive(Debug, thiserror::Error)]
    #[error("unreachable")]
    struct Never;

    /// In-memory store whose version is bumped by the test.
    struct MemoryStore {
        version: Arc<AtomicU64>,
        values: ValueMap,
    }

    impl StoreClient for MemoryStore {
        type Error = Never;

        async fn get_values(&self, _prefix: &str, keys: &[String]) -> Result<ValueMap, Never> {
            Ok(keys
                .iter()
                .map(|k| (k.clone(), self.values.get(k).cloned().unwrap_or_default()))
                .collect())
        }

        async fn watch_prefix(
            &self,
            _prefix: &str,
            _keys: &[String],
            last: u64,
            cancel: &CancellationToken,
        ) -> Result<u64, Never> {
            if last == INITIAL_VERSION {
                return Ok(FIRST_VERSION);
            }
            loop {
                let current = self.version.load(Ordering::SeqCst);
                if current != last {
                    return Ok(current);
                }
                tokio::select! {
                    () = cancel.cancelled() => return Ok(last),
                    () = tokio::task::yield_now() => {}
                }
            }
        }
    }

    fn store() -> MemoryStore {
        MemoryStore {
            version: Arc::new(AtomicU64::new(5)),
            values: HashMap::from([("x".to_string(), "1".to_string())]),
        }
    }

    #[tokio::test]
    async fn engine_loop_over_contract() {
        let store = store();
        let keys = vec!["x".to_string(), "y".to_string()];
        let cancel = CancellationToken::new();

        let token = assert_ok!(store.watch_prefix("/", &keys, INITIAL_VERSION, &cancel).await);
        assert_eq!(token, FIRST_VERSION);

        let values = assert_ok!(store.get_values("/", &keys).await);
        assert_eq!(values["x"], "1");
        assert_eq!(values["y"], "");

        let version = Arc::clone(&store.version);
        tokio::spawn(async move { version.store(6, Ordering::SeqCst) });
        let token = assert_ok!(store.watch_prefix("/", &keys, 5, &cancel).await);
        assert_eq!(token, 6);
    }

    #[tokio::test]
    async fn cancelled_watch_returns_last_token() {
        let store = store();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let token = assert_ok!(store.watch_prefix("/", &[], 5, &cancel).await);
        assert_eq!(token, 5);
    }
}
