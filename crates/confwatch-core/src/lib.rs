//! # confwatch Core
//!
//! Backend-neutral contract between a configuration-templating engine and
//! the remote key/value stores it renders from.
//!
//! This crate provides:
//! - [`Endpoint`]: the single remote endpoint an adapter talks to
//! - [`StoreClient`]: the "get values by prefix" and "watch for changes" contract
//! - Version token conventions shared by every backend

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod endpoint;
pub mod store;

pub use endpoint::{Endpoint, EndpointError};
pub use store::{StoreClient, ValueMap, FIRST_VERSION, INITIAL_VERSION};
