//! CloudEvent Sources - event source adapters
//!
//! Adapters that turn external event sources into CloudEvents v1.0 and
//! deliver them over HTTP to a configured sink:
//!
//! - **Webhook receiver**: inbound HTTP POST with optional basic credentials
//! - **Scheduled poller**: periodic outbound HTTP requests
//! - **Streaming client**: Bayeux/CometD long-polling with replay
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): envelope and config models, errors, ports
//! - **Service Layer** (`services`): normalization and the delivery pipeline
//! - **Infrastructure Layer** (`infrastructure`): HTTP client, sink, Bayeux
//!   protocol, configuration and logging
//! - **Adapters** (`adapters`): the three event source front-ends
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use cloudevent_sources::domain::models::{EventAttributes, NormalizerOptions};
//! use cloudevent_sources::services::Normalizer;
//!
//! let normalizer = Normalizer::new(
//!     EventAttributes::new("dev.example.ping", "default.ping"),
//!     NormalizerOptions::default(),
//! );
//! let envelope = normalizer.normalize(br#"{"ok":true}"#)?;
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

#[doc(hidden)]
pub use serde_json as __serde_json;

// Re-export commonly used types for convenience
pub use adapters::{HttpPoller, StreamingAdapter, WebhookReceiver};
pub use domain::models::{DispatchResult, Envelope, EventAttributes, NormalizerOptions};
pub use domain::ports::{EventDispatcher, Logger};
pub use domain::{AdapterError, AdapterResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{EventPipeline, Normalizer};
