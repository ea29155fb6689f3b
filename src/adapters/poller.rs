//! Scheduled HTTP poller.
//!
//! Issues one request immediately and then once per interval. Every response
//! body becomes one envelope. Failures are logged and the next tick retries.

use axum::routing::get;
use axum::Router;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Url};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::server::{self, Lifecycle, LifecycleState, SHUTDOWN_GRACE_PERIOD};
use crate::domain::errors::{AdapterError, AdapterResult};
use crate::domain::models::{BasicAuth, Envelope, PollerConfig};
use crate::domain::ports::Logger;
use crate::fields;
use crate::services::EventPipeline;

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Request attributes built once at startup and reused on every tick.
#[derive(Debug, Clone)]
pub struct PollRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    basic_auth: Option<BasicAuth>,
}

impl PollRequest {
    pub fn from_config(config: &PollerConfig) -> AdapterResult<Self> {
        let url = Url::parse(&config.endpoint)
            .map_err(|e| AdapterError::Configuration(format!("invalid endpoint: {e}")))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| AdapterError::Configuration(format!("invalid header {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| AdapterError::Configuration(format!("invalid header {name}: {e}")))?;
            headers.append(name, value);
        }

        Ok(Self {
            method: config.method.clone(),
            url,
            headers,
            basic_auth: config.basic_auth.clone(),
        })
    }

    pub const fn url(&self) -> &Url {
        &self.url
    }

    fn build(&self, http: &Client) -> RequestBuilder {
        let request = http
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone());

        match &self.basic_auth {
            Some(auth) => request.basic_auth(&auth.username, Some(&auth.password)),
            None => request,
        }
    }
}

/// Polls an HTTP endpoint on a fixed cadence and dispatches each response.
pub struct HttpPoller {
    http: Client,
    request: PollRequest,
    interval: Duration,
    port: u16,
    pipeline: Arc<EventPipeline>,
    logger: Arc<dyn Logger>,
    lifecycle: Lifecycle,
    grace: Duration,
}

impl HttpPoller {
    pub fn new(
        http: Client,
        config: &PollerConfig,
        pipeline: Arc<EventPipeline>,
        logger: Arc<dyn Logger>,
    ) -> AdapterResult<Self> {
        Ok(Self {
            http,
            request: PollRequest::from_config(config)?,
            interval: config.interval.as_duration(),
            port: config.port,
            pipeline,
            logger,
            lifecycle: Lifecycle::new(),
            grace: SHUTDOWN_GRACE_PERIOD,
        })
    }

    /// Override the shutdown grace period.
    #[must_use]
    pub const fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    pub fn lifecycle(&self) -> watch::Receiver<LifecycleState> {
        self.lifecycle.subscribe()
    }

    /// Issue one request and dispatch its body.
    pub async fn poll_once(&self) -> AdapterResult<Envelope> {
        let response = self
            .request
            .build(&self.http)
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(AdapterError::Protocol(format!(
                "endpoint answered HTTP {}: {}",
                status.as_u16(),
                String::from_utf8_lossy(&body)
                    .chars()
                    .take(MAX_ERROR_BODY_CHARS)
                    .collect::<String>()
            )));
        }

        self.pipeline.process(&body).await
    }

    /// Run the ticker and the liveness listener until `shutdown` is
    /// cancelled or the listener fails.
    pub async fn run(&self, listener: TcpListener, shutdown: CancellationToken) -> AdapterResult<()> {
        self.logger.info(
            "poller starting",
            fields! {
                "endpoint" => self.request.url().to_string(),
                "method" => self.request.method.as_str(),
                "interval_secs" => self.interval.as_secs_f64(),
            },
        );

        let local = shutdown.child_token();
        let router = Router::new().route("/health", get(server::health));

        let serve = async {
            let result = server::serve(listener, router, local.clone(), self.grace, &self.lifecycle).await;
            local.cancel();
            result
        };
        let (result, ()) = tokio::join!(serve, self.tick(local.clone()));

        match &result {
            Ok(()) => self.logger.info("poller stopped", fields!()),
            Err(err) => self.logger.error(
                "poller stopped with error",
                fields! { "error" => err.to_string() },
            ),
        }
        result
    }

    async fn tick(&self, shutdown: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let outcome = tokio::select! {
                outcome = self.poll_once() => outcome,
                () = async {
                    shutdown.cancelled().await;
                    sleep(self.grace).await;
                } => {
                    self.logger.warn("abandoning in-flight poll after grace period", fields!());
                    break;
                }
            };

            match outcome {
                Ok(envelope) => self.logger.info(
                    "poll dispatched",
                    fields! { "id" => envelope.id, "bytes" => envelope.data.map_or(0, |d| d.len()) },
                ),
                Err(err) => self.logger.error(
                    "poll failed",
                    fields! { "error" => err.to_string() },
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{PollingInterval, TlsConfig};

    fn config() -> PollerConfig {
        PollerConfig {
            endpoint: "https://api.example.com/v1/status".to_string(),
            method: Method::GET,
            headers: vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("X-Tenant".to_string(), "acme".to_string()),
            ],
            basic_auth: Some(BasicAuth::new("user", "")),
            tls: TlsConfig::default(),
            interval: "5m".parse::<PollingInterval>().unwrap(),
            port: 8080,
        }
    }

    #[test]
    fn test_request_is_prebuilt_from_config() {
        let request = PollRequest::from_config(&config()).unwrap();
        let built = request.build(&Client::new()).build().unwrap();

        assert_eq!(built.method(), &Method::GET);
        assert_eq!(built.url().as_str(), "https://api.example.com/v1/status");
        assert_eq!(built.headers()["accept"], "application/json");
        assert_eq!(built.headers()["x-tenant"], "acme");
        assert!(built.headers()["authorization"]
            .to_str()
            .unwrap()
            .starts_with("Basic "));
    }

    #[test]
    fn test_invalid_endpoint_is_configuration_error() {
        let mut config = config();
        config.endpoint = "::not a url".to_string();
        assert!(matches!(
            PollRequest::from_config(&config),
            Err(AdapterError::Configuration(_))
        ));
    }
}
