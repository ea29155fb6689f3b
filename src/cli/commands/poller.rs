//! Implementation of the `poller` command.

use anyhow::Result;
use clap::Args;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::common::{build_pipeline, PayloadFieldArgs, SinkArgs};
use crate::adapters::poller::HttpPoller;
use crate::adapters::server;
use crate::domain::errors::AdapterError;
use crate::domain::models::{AdapterConfig, PollerConfig, TlsConfig};
use crate::infrastructure::config::{ConfigError, ConfigLoader};
use crate::infrastructure::http::{build_client, HttpClientConfig};
use crate::infrastructure::logging::TracingLogger;

#[derive(Args, Debug, Clone)]
pub struct PollerArgs {
    #[command(flatten)]
    pub sink: SinkArgs,

    #[command(flatten)]
    pub fields: PayloadFieldArgs,

    /// Port of the liveness endpoint
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Type of the emitted events
    #[arg(long, env = "HTTPPOLLER_EVENT_TYPE")]
    pub event_type: String,

    /// Source of the emitted events (defaults to NAMESPACE.NAME)
    #[arg(long, env = "HTTPPOLLER_EVENT_SOURCE")]
    pub event_source: Option<String>,

    /// URL to poll
    #[arg(long, env = "HTTPPOLLER_ENDPOINT")]
    pub endpoint: String,

    /// HTTP method of each poll
    #[arg(long, env = "HTTPPOLLER_METHOD", default_value = "GET")]
    pub method: String,

    /// Request headers as name:value pairs separated by commas
    #[arg(long, env = "HTTPPOLLER_HEADERS")]
    pub headers: Option<String>,

    #[arg(long, env = "HTTPPOLLER_BASICAUTH_USERNAME")]
    pub basic_auth_username: Option<String>,

    #[arg(long, env = "HTTPPOLLER_BASICAUTH_PASSWORD", hide_env_values = true)]
    pub basic_auth_password: Option<String>,

    /// PEM encoded CA certificate to trust
    #[arg(long, env = "HTTPPOLLER_CA_CERTIFICATE")]
    pub ca_certificate: Option<String>,

    /// Accept any server certificate
    #[arg(long, env = "HTTPPOLLER_SKIP_VERIFY")]
    pub skip_verify: bool,

    /// Polling interval, e.g. 5m, 1h or 1d
    #[arg(long, env = "HTTPPOLLER_INTERVAL")]
    pub interval: String,
}

impl PollerArgs {
    pub fn into_config(self) -> Result<AdapterConfig<PollerConfig>, ConfigError> {
        let endpoint = ConfigLoader::http_url(
            &ConfigLoader::required(&self.endpoint, "HTTPPOLLER_ENDPOINT")?,
            "HTTPPOLLER_ENDPOINT",
        )?;

        let settings = PollerConfig {
            endpoint: endpoint.to_string(),
            method: ConfigLoader::method(&self.method)?,
            headers: ConfigLoader::headers(self.headers.as_deref())?,
            basic_auth: ConfigLoader::lenient_basic_auth(
                self.basic_auth_username.as_deref(),
                self.basic_auth_password.as_deref(),
            ),
            tls: TlsConfig {
                ca_certificate: self.ca_certificate.filter(|pem| !pem.trim().is_empty()),
                skip_verify: self.skip_verify,
            },
            interval: ConfigLoader::interval(&self.interval)?,
            port: self.port,
        };
        let source = self.sink.event_source(self.event_source.as_deref())?;

        self.sink.adapter_config(
            &self.event_type,
            "HTTPPOLLER_EVENT_TYPE",
            source,
            self.fields.options(),
            settings,
        )
    }
}

pub async fn execute(args: PollerArgs, shutdown: CancellationToken) -> Result<()> {
    let config = args.into_config().map_err(AdapterError::from)?;
    // The endpoint's TLS trust must not leak into delivery to the sink.
    let http = build_client(&HttpClientConfig {
        tls: config.settings.tls.clone(),
        ..HttpClientConfig::default()
    })?;
    let pipeline = build_pipeline(&config, build_client(&HttpClientConfig::default())?)?;

    let poller = HttpPoller::new(
        http,
        &config.settings,
        pipeline,
        Arc::new(TracingLogger::new("poller")),
    )?;
    let listener = server::bind(poller.port()).await?;
    poller.run(listener, shutdown).await?;
    Ok(())
}
