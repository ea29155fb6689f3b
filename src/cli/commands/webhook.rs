//! Implementation of the `webhook` command.

use anyhow::Result;
use clap::Args;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::common::{build_pipeline, PayloadFieldArgs, SinkArgs};
use crate::adapters::server;
use crate::adapters::webhook::WebhookReceiver;
use crate::domain::errors::AdapterError;
use crate::domain::models::{AdapterConfig, WebhookConfig};
use crate::infrastructure::config::{ConfigError, ConfigLoader};
use crate::infrastructure::http::{build_client, HttpClientConfig};
use crate::infrastructure::logging::TracingLogger;

#[derive(Args, Debug, Clone)]
pub struct WebhookArgs {
    #[command(flatten)]
    pub sink: SinkArgs,

    #[command(flatten)]
    pub fields: PayloadFieldArgs,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Type of the emitted events
    #[arg(long, env = "HTTP_EVENT_TYPE")]
    pub event_type: String,

    /// Source of the emitted events (defaults to NAMESPACE.NAME)
    #[arg(long, env = "HTTP_EVENT_SOURCE")]
    pub event_source: Option<String>,

    /// Username callers must present
    #[arg(long, env = "HTTP_BASICAUTH_USERNAME")]
    pub basic_auth_username: Option<String>,

    /// Password callers must present
    #[arg(long, env = "HTTP_BASICAUTH_PASSWORD", hide_env_values = true)]
    pub basic_auth_password: Option<String>,
}

impl WebhookArgs {
    pub fn into_config(self) -> Result<AdapterConfig<WebhookConfig>, ConfigError> {
        let settings = WebhookConfig {
            port: self.port,
            basic_auth: ConfigLoader::strict_basic_auth(
                self.basic_auth_username.as_deref(),
                self.basic_auth_password.as_deref(),
                "webhook",
            )?,
        };
        let source = self.sink.event_source(self.event_source.as_deref())?;

        self.sink.adapter_config(
            &self.event_type,
            "HTTP_EVENT_TYPE",
            source,
            self.fields.options(),
            settings,
        )
    }
}

pub async fn execute(args: WebhookArgs, shutdown: CancellationToken) -> Result<()> {
    let config = args.into_config().map_err(AdapterError::from)?;
    let http = build_client(&HttpClientConfig::default())?;
    let pipeline = build_pipeline(&config, http)?;

    let receiver = WebhookReceiver::new(
        &config.settings,
        pipeline,
        Arc::new(TracingLogger::new("webhook")),
    );
    let listener = server::bind(config.settings.port).await?;
    receiver.run(listener, shutdown).await?;
    Ok(())
}
