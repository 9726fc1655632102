//! Gerrit Relay – request orchestration for the Gerrit REST API
//!
//! This crate implements the client side of a code-review server's HTTP API:
//! - Authenticated requests through a pluggable transport (reqwest by default)
//! - Response envelope normalization (`)]}'` prefix, status classification)
//! - Deduplication of concurrent identical GET requests
//! - Typed change queries with filter groups, annotations and pagination
//! - A readonly policy that refuses every mutating request
//!
//! Operations never fail with an error: they return `None`, `false` or an
//! empty collection and report the cause through a [`client::notify::Notifier`].

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Client core: pipeline components and endpoint operations
pub mod client;

// Re-export key types for convenience
pub use client::{ClientConfig, GerritClient};

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
