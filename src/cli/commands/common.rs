//! Arguments and wiring shared by every adapter subcommand.

use anyhow::Result;
use clap::Args;
use reqwest::Client;
use std::sync::Arc;

use crate::domain::errors::AdapterError;
use crate::domain::models::{AdapterConfig, EventAttributes, NormalizerOptions};
use crate::infrastructure::config::{ConfigError, ConfigLoader};
use crate::infrastructure::logging::TracingLogger;
use crate::infrastructure::sink::CloudEventsHttpDispatcher;
use crate::services::{EventPipeline, Normalizer};

/// Sink and identity settings injected by the control plane.
#[derive(Args, Debug, Clone)]
pub struct SinkArgs {
    /// URL of the sink that receives the CloudEvents
    #[arg(long = "sink", env = "K_SINK")]
    pub sink: String,

    /// Namespace of the source object
    #[arg(long, env = "NAMESPACE", default_value = "")]
    pub namespace: String,

    /// Name of the source object
    #[arg(long, env = "NAME", default_value = "")]
    pub name: String,

    /// JSON object with extensions added to every event
    #[arg(long, env = "K_CE_OVERRIDES")]
    pub ce_overrides: Option<String>,

    /// Timeout for a single delivery to the sink
    #[arg(long, env = "SINK_TIMEOUT_SECS", default_value_t = 30)]
    pub sink_timeout_secs: u64,
}

impl SinkArgs {
    /// `override_source`, or `"{namespace}.{name}"` when absent.
    pub fn event_source(&self, override_source: Option<&str>) -> Result<String, ConfigError> {
        ConfigLoader::event_source(override_source, &self.namespace, &self.name)
    }

    pub fn adapter_config<T>(
        &self,
        event_type: &str,
        event_type_var: &'static str,
        source: String,
        normalizer: NormalizerOptions,
        settings: T,
    ) -> Result<AdapterConfig<T>, ConfigError> {
        let mut attributes =
            EventAttributes::new(ConfigLoader::required(event_type, event_type_var)?, source);
        attributes.extensions = ConfigLoader::ce_overrides(self.ce_overrides.as_deref())?;

        Ok(AdapterConfig {
            attributes,
            sink: ConfigLoader::sink(&self.sink, self.sink_timeout_secs)?,
            normalizer,
            settings,
        })
    }
}

/// Optional payload fields lifted into event attributes.
#[derive(Args, Debug, Clone, Default)]
pub struct PayloadFieldArgs {
    /// Field or JSON pointer holding the event subject
    #[arg(long, env = "EVENT_SUBJECT_FIELD")]
    pub subject_field: Option<String>,

    /// Field or JSON pointer holding an RFC 3339 event time
    #[arg(long, env = "EVENT_TIME_FIELD")]
    pub time_field: Option<String>,

    /// Field or JSON pointer holding a required correlation value
    #[arg(long, env = "EVENT_CORRELATION_FIELD")]
    pub correlation_field: Option<String>,
}

impl PayloadFieldArgs {
    pub fn options(&self) -> NormalizerOptions {
        ConfigLoader::normalizer_options(
            self.subject_field.as_deref(),
            self.time_field.as_deref(),
            self.correlation_field.as_deref(),
        )
    }
}

/// Build the normalize-then-dispatch pipeline over the shared client.
pub fn build_pipeline<T>(config: &AdapterConfig<T>, http: Client) -> Result<Arc<EventPipeline>, AdapterError> {
    let dispatcher = CloudEventsHttpDispatcher::new(http, &config.sink)?;
    let normalizer = Normalizer::new(config.attributes.clone(), config.normalizer.clone());

    Ok(Arc::new(EventPipeline::new(
        normalizer,
        Arc::new(dispatcher),
        Arc::new(TracingLogger::new("pipeline")),
    )))
}
