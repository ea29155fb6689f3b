use serde_json::{Map, Value};

use super::secret_scrubbing::SecretScrubber;
use crate::domain::ports::{Fields, Level, Logger};

/// [`Logger`] port backed by `tracing`.
///
/// Messages and field values are scrubbed of credentials before emission.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    component: &'static str,
    scrubber: SecretScrubber,
}

impl TracingLogger {
    pub const fn new(component: &'static str) -> Self {
        Self {
            component,
            scrubber: SecretScrubber::new(),
        }
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str, fields: Fields) {
        let message = self.scrubber.scrub_message(message);
        let fields = self
            .scrubber
            .scrub_message(&Value::Object(fields.into_iter().collect::<Map<_, _>>()).to_string());
        let component = self.component;

        match level {
            Level::Debug => tracing::debug!(component, fields = %fields, "{message}"),
            Level::Info => tracing::info!(component, fields = %fields, "{message}"),
            Level::Warn => tracing::warn!(component, fields = %fields, "{message}"),
            Level::Error => tracing::error!(component, fields = %fields, "{message}"),
        }
    }
}
