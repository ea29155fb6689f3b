//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON or pretty stdout formatting through a non-blocking writer
//! - `Logger` port implementations (tracing-backed and in-memory)
//! - Secret scrubbing

pub mod config;
pub mod logger;
pub mod memory;
pub mod secret_scrubbing;
pub mod tracing_logger;

pub use config::{LogConfig, LogFormat};
pub use logger::{parse_log_level, LoggerImpl};
pub use memory::{LogRecord, MemoryLogger};
pub use secret_scrubbing::{redact, SecretScrubber};
pub use tracing_logger::TracingLogger;
