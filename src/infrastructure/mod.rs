//! Infrastructure layer module
//!
//! External integrations behind the domain ports:
//! - Configuration loading and validation
//! - Logging backend
//! - Shared outbound HTTP client
//! - CloudEvents sink dispatcher
//! - Bayeux/CometD streaming client

pub mod bayeux;
pub mod config;
pub mod http;
pub mod logging;
pub mod sink;
