//! Implementation of the `stream` command.

use anyhow::Result;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::common::{build_pipeline, SinkArgs};
use crate::adapters::streaming::StreamingAdapter;
use crate::domain::errors::AdapterError;
use crate::domain::models::{
    AdapterConfig, NormalizerOptions, StreamAuth, StreamConfig, REPLAY_ALL_RETAINED,
};
use crate::domain::ports::Logger;
use crate::fields;
use crate::infrastructure::bayeux::BayeuxClient;
use crate::infrastructure::config::{ConfigError, ConfigLoader};
use crate::infrastructure::http::{build_client, HttpClientConfig};
use crate::infrastructure::logging::{redact, TracingLogger};

#[derive(Args, Debug, Clone)]
pub struct StreamArgs {
    #[command(flatten)]
    pub sink: SinkArgs,

    /// Base URL of the instance hosting the CometD endpoint
    #[arg(long, env = "SALESFORCE_INSTANCE_URL")]
    pub instance_url: Option<String>,

    /// Pre-issued bearer token sent with every request
    #[arg(long, env = "SALESFORCE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// PEM encoded RSA key that signs the JWT bearer assertion
    #[arg(long, env = "SALESFORCE_CERT_KEY", hide_env_values = true)]
    pub cert_key: Option<String>,

    /// Connected app consumer key, the assertion issuer
    #[arg(long, env = "SALESFORCE_CLIENT_ID")]
    pub client_id: Option<String>,

    /// User the assertion is issued for
    #[arg(long, env = "SALESFORCE_USER")]
    pub user: Option<String>,

    /// Authorization server, e.g. https://login.salesforce.com
    #[arg(long, env = "SALESFORCE_AUTH_SERVER")]
    pub auth_server: Option<String>,

    #[arg(long, env = "SALESFORCE_API_VERSION", default_value = "48.0")]
    pub api_version: String,

    /// Topics separated by commas, each optionally topic=replayId
    #[arg(long, env = "SALESFORCE_SUBSCRIPTIONS")]
    pub subscriptions: String,

    /// Replay marker for topics without one (-1 new only, -2 all retained)
    #[arg(long, env = "SALESFORCE_REPLAY_ID", default_value_t = REPLAY_ALL_RETAINED, allow_negative_numbers = true)]
    pub replay_id: i64,

    #[arg(long, env = "SALESFORCE_EVENT_TYPE", default_value = "com.salesforce.stream.message")]
    pub event_type: String,

    /// Source of the emitted events (defaults to the instance URL)
    #[arg(long, env = "SALESFORCE_EVENT_SOURCE")]
    pub event_source: Option<String>,

    /// Client-side bound on a single long-poll
    #[arg(long, env = "SALESFORCE_CONNECT_TIMEOUT_SECS", default_value_t = 120)]
    pub connect_timeout_secs: u64,

    #[arg(long, env = "STREAM_BACKOFF_INITIAL_MS", default_value_t = 500)]
    pub backoff_initial_ms: u64,

    #[arg(long, env = "STREAM_BACKOFF_MAX_MS", default_value_t = 30_000)]
    pub backoff_max_ms: u64,
}

impl StreamArgs {
    pub fn into_config(self) -> Result<AdapterConfig<StreamConfig>, ConfigError> {
        let auth = ConfigLoader::stream_auth(
            self.instance_url.as_deref(),
            self.access_token.as_deref(),
            self.cert_key.as_deref(),
            self.client_id.as_deref(),
            self.user.as_deref(),
            self.auth_server.as_deref(),
        )?;
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("connect"));
        }

        let default_source = match &auth {
            StreamAuth::Token(credentials) => credentials.instance_url.clone(),
            StreamAuth::Jwt(jwt) => jwt.auth_server.clone(),
        };
        let settings = StreamConfig {
            auth,
            api_version: ConfigLoader::required(&self.api_version, "SALESFORCE_API_VERSION")?,
            subscriptions: ConfigLoader::subscriptions(&self.subscriptions, self.replay_id)?,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            backoff: ConfigLoader::backoff(self.backoff_initial_ms, self.backoff_max_ms)?,
        };
        let source = self
            .event_source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map_or(default_source, str::to_string);

        self.sink.adapter_config(
            &self.event_type,
            "SALESFORCE_EVENT_TYPE",
            source,
            NormalizerOptions::default(),
            settings,
        )
    }
}

pub async fn execute(args: StreamArgs, shutdown: CancellationToken) -> Result<()> {
    let config = args.into_config().map_err(AdapterError::from)?;
    let http = build_client(&HttpClientConfig::default())?;
    let pipeline = build_pipeline(&config, http.clone())?;

    let logger: Arc<dyn Logger> = Arc::new(TracingLogger::new("stream"));
    match &config.settings.auth {
        StreamAuth::Token(credentials) => logger.info(
            "stream adapter starting",
            fields! {
                "instance_url" => credentials.instance_url,
                "access_token" => redact(&credentials.access_token),
                "topics" => config.settings.subscriptions.len(),
            },
        ),
        StreamAuth::Jwt(jwt) => logger.info(
            "stream adapter starting",
            fields! {
                "auth_server" => jwt.auth_server,
                "user" => jwt.user,
                "topics" => config.settings.subscriptions.len(),
            },
        ),
    }

    let client = BayeuxClient::login(http, &config.settings)
        .await
        .map_err(|e| AdapterError::SessionStart(e.to_string()))?;

    let adapter = StreamingAdapter::new(
        Arc::new(client),
        pipeline,
        logger,
        config.settings.subscriptions.clone(),
        config.settings.backoff,
    );
    adapter.run(shutdown).await?;
    Ok(())
}
