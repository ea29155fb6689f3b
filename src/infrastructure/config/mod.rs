//! Configuration management infrastructure
//!
//! Converts raw environment values into the typed configuration structs:
//! - URL, interval, header and subscription parsing
//! - Credential pairing rules
//! - CloudEvent extension overrides

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
