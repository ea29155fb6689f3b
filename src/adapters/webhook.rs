//! Webhook receiver.
//!
//! Accepts `POST /` with a JSON payload, optionally guarded by HTTP basic
//! credentials, and dispatches one envelope per request. `GET /health`
//! reports liveness.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use super::server::{self, Lifecycle, LifecycleState, SHUTDOWN_GRACE_PERIOD};
use crate::domain::errors::{AdapterError, AdapterResult};
use crate::domain::models::{BasicAuth, WebhookConfig};
use crate::domain::ports::Logger;
use crate::fields;
use crate::services::EventPipeline;

/// Why a webhook request was refused. Response text is fixed and never
/// includes request content or internal error detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookRejection {
    MissingBody,
    MalformedAuthorization,
    InvalidCredentials,
    UnparsableBody,
    DeliveryFailed,
}

impl WebhookRejection {
    pub const fn status(self) -> StatusCode {
        match self {
            Self::MissingBody | Self::MalformedAuthorization => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::UnparsableBody | Self::DeliveryFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub const fn message(self) -> &'static str {
        match self {
            Self::MissingBody => "request body is required",
            Self::MalformedAuthorization => "malformed Authorization header",
            Self::InvalidCredentials => "invalid credentials",
            Self::UnparsableBody => "request body could not be parsed",
            Self::DeliveryFailed => "event could not be delivered",
        }
    }
}

impl IntoResponse for WebhookRejection {
    fn into_response(self) -> Response {
        let mut response = (self.status(), self.message()).into_response();
        if self == Self::InvalidCredentials {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                header::HeaderValue::from_static("Basic realm=\"webhook\""),
            );
        }
        response
    }
}

struct WebhookState {
    pipeline: Arc<EventPipeline>,
    credentials: Option<BasicAuth>,
    logger: Arc<dyn Logger>,
}

/// HTTP front-end that turns inbound calls into envelopes.
pub struct WebhookReceiver {
    state: Arc<WebhookState>,
    lifecycle: Lifecycle,
    grace: Duration,
}

impl WebhookReceiver {
    pub fn new(config: &WebhookConfig, pipeline: Arc<EventPipeline>, logger: Arc<dyn Logger>) -> Self {
        Self {
            state: Arc::new(WebhookState {
                pipeline,
                credentials: config.basic_auth.clone(),
                logger,
            }),
            lifecycle: Lifecycle::new(),
            grace: SHUTDOWN_GRACE_PERIOD,
        }
    }

    /// Override the shutdown grace period.
    #[must_use]
    pub const fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn lifecycle(&self) -> watch::Receiver<LifecycleState> {
        self.lifecycle.subscribe()
    }

    /// Build the router. Each receiver owns its own router instance.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", post(ingest))
            .route("/health", get(server::health))
            .with_state(Arc::clone(&self.state))
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until `shutdown` is cancelled; blocks until shutdown completes.
    pub async fn run(&self, listener: TcpListener, shutdown: CancellationToken) -> AdapterResult<()> {
        self.state.logger.info(
            "webhook receiver starting",
            fields! {
                "address" => listener.local_addr().map(|a| a.to_string()).unwrap_or_default(),
                "credentials_required" => self.state.credentials.is_some(),
            },
        );

        let result = server::serve(listener, self.router(), shutdown, self.grace, &self.lifecycle).await;

        match &result {
            Ok(()) => self.state.logger.info("webhook receiver stopped", fields!()),
            Err(err) => self.state.logger.error(
                "webhook receiver stopped with error",
                fields! { "error" => err.to_string() },
            ),
        }
        result
    }
}

async fn ingest(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookRejection> {
    if body.is_empty() {
        return Err(WebhookRejection::MissingBody);
    }

    if let Some(expected) = &state.credentials {
        let Some((username, password)) = basic_credentials(&headers) else {
            state
                .logger
                .warn("rejected request with malformed Authorization header", fields!());
            return Err(WebhookRejection::MalformedAuthorization);
        };

        let matches = constant_time_eq(username.as_bytes(), expected.username.as_bytes())
            & constant_time_eq(password.as_bytes(), expected.password.as_bytes());
        if !matches {
            state.logger.warn(
                "rejected request with invalid credentials",
                fields! { "username" => username },
            );
            return Err(WebhookRejection::InvalidCredentials);
        }
    }

    match state.pipeline.process(&body).await {
        Ok(envelope) => Ok((StatusCode::OK, Json(json!({ "id": envelope.id })))),
        Err(AdapterError::MalformedPayload(detail)) => {
            state.logger.error(
                "could not parse webhook payload",
                fields! { "error" => detail, "bytes" => body.len() },
            );
            Err(WebhookRejection::UnparsableBody)
        }
        Err(err) => {
            state.logger.error(
                "could not deliver webhook event",
                fields! { "error" => err.to_string() },
            );
            Err(WebhookRejection::DeliveryFailed)
        }
    }
}

/// Extract `(username, password)` from a `Basic` Authorization header.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
