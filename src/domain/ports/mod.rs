//! Port trait definitions (Hexagonal Architecture)
//!
//! - EventDispatcher: delivery of envelopes to the sink
//! - Logger: structured logging operations
//!
//! Infrastructure adapters implement these so the services stay independent
//! of the HTTP client and logging backend.

pub mod dispatcher;
pub mod logger;

pub use dispatcher::EventDispatcher;
pub use logger::{Fields, Level, Logger};
