//! # Hesperides Adapter
//!
//! Exposes a Hesperides configuration store, reachable only through its
//! REST API with basic authentication, as a [`confwatch_core::StoreClient`].
//!
//! ## Resources
//!
//! - `GET /rest/versions`: liveness probe used while connecting
//! - `GET /rest/applications/{app}/platforms/{platform}`: carries `version_id`
//! - `GET /rest/applications/{app}/platforms/{platform}/properties?path=...`
//!
//! ## Change Detection
//!
//! Hesperides has no push notifications. A watch polls the platform's
//! `version_id` until it differs from the caller's token. The version is
//! platform-wide, so a change under any prefix wakes every watcher.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod client;
pub mod encoding;
pub mod watcher;

pub use backoff::{retry, BackoffPolicy};
pub use client::{ClientError, HesperidesClient, HesperidesConfig};
pub use encoding::{basic_auth, properties_path, query_escape};
