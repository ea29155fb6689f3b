use serde_json::Value;
use std::collections::HashMap;

/// Structured key-value context attached to a log record
pub type Fields = HashMap<String, Value>;

/// Log level enumeration for structured logging
///
/// Levels are ordered from most verbose (Debug) to most severe (Error).
///
/// # Examples
///
/// ```
/// use cloudevent_sources::domain::ports::Level;
///
/// assert!(Level::Error > Level::Info);
/// assert!(Level::Debug < Level::Warn);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Detailed diagnostics, usually disabled in production
    Debug,
    /// Normal operation and significant lifecycle events
    Info,
    /// Recoverable problems worth investigating
    Warn,
    /// Failures that dropped an event or stopped a component
    Error,
}

impl Level {
    /// Returns the string representation of the log level
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// Port trait for structured logging
///
/// Adapters, the pipeline and the protocol client depend only on this trait,
/// so any structured-logging backend can sit behind it. The production
/// implementation forwards to `tracing`; tests capture records in memory.
///
/// # Examples
///
/// ```
/// use cloudevent_sources::domain::ports::Logger;
/// use cloudevent_sources::fields;
///
/// fn on_batch(logger: &dyn Logger, channel: &str, count: usize) {
///     logger.info("received batch", fields! { "channel" => channel, "count" => count });
/// }
/// ```
pub trait Logger: Send + Sync {
    /// Log a message with a specific level and structured fields
    fn log(&self, level: Level, message: &str, fields: Fields);

    /// Log a debug-level message
    fn debug(&self, message: &str, fields: Fields) {
        self.log(Level::Debug, message, fields);
    }

    /// Log an info-level message
    fn info(&self, message: &str, fields: Fields) {
        self.log(Level::Info, message, fields);
    }

    /// Log a warning-level message
    fn warn(&self, message: &str, fields: Fields) {
        self.log(Level::Warn, message, fields);
    }

    /// Log an error-level message
    fn error(&self, message: &str, fields: Fields) {
        self.log(Level::Error, message, fields);
    }
}

/// Build a [`Fields`] map from `key => value` pairs.
///
/// Values can be anything that implements `serde::Serialize`.
#[macro_export]
macro_rules! fields {
    () => {
        $crate::domain::ports::Fields::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut fields = $crate::domain::ports::Fields::new();
        $(
            fields.insert(
                ($key).to_string(),
                $crate::__serde_json::to_value(&$value).unwrap_or($crate::__serde_json::Value::Null),
            );
        )+
        fields
    }};
}
