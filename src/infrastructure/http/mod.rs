//! Shared outbound HTTP client construction.

pub mod client;

pub use client::{build_client, HttpClientConfig};
