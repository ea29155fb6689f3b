//! Shared fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cloudevent_sources::domain::models::{
    BackoffConfig, Credentials, DispatchError, DispatchResult, Envelope, EventAttributes,
    JwtCredentials, NormalizerOptions, StreamAuth, StreamConfig, Subscription,
};
use cloudevent_sources::domain::ports::EventDispatcher;
use cloudevent_sources::infrastructure::logging::MemoryLogger;
use cloudevent_sources::services::{EventPipeline, Normalizer};

/// Dispatcher that records every envelope it is given.
#[derive(Default)]
pub struct RecordingDispatcher {
    reject: bool,
    delay: Duration,
    sent: Mutex<Vec<Envelope>>,
}

impl RecordingDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A dispatcher whose sink never acknowledges.
    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            reject: true,
            ..Self::default()
        })
    }

    /// A dispatcher that holds every delivery for `delay` before answering.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventDispatcher for RecordingDispatcher {
    async fn dispatch(&self, envelope: &Envelope) -> DispatchResult {
        self.sent.lock().unwrap().push(envelope.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.reject {
            DispatchResult::failed(DispatchError::Rejected {
                status: 503,
                body: "sink unavailable".to_string(),
            })
        } else {
            DispatchResult::acknowledged()
        }
    }
}

pub fn attributes() -> EventAttributes {
    EventAttributes::new("dev.example.webhook", "default.hooks")
}

pub fn pipeline_with(
    dispatcher: Arc<RecordingDispatcher>,
    attributes: EventAttributes,
    options: NormalizerOptions,
) -> (Arc<EventPipeline>, Arc<MemoryLogger>) {
    let logger = Arc::new(MemoryLogger::new());
    let pipeline = EventPipeline::new(Normalizer::new(attributes, options), dispatcher, logger.clone());
    (Arc::new(pipeline), logger)
}

pub fn pipeline(dispatcher: Arc<RecordingDispatcher>) -> (Arc<EventPipeline>, Arc<MemoryLogger>) {
    pipeline_with(dispatcher, attributes(), NormalizerOptions::default())
}

pub const ACCESS_TOKEN: &str = "00Dxx0000001gPL!AR8AQ";

pub fn credentials(instance_url: &str) -> Credentials {
    Credentials::new(instance_url, ACCESS_TOKEN)
}

/// RSA key used to sign JWT bearer assertions in tests.
pub const SIGNING_KEY: &str = include_str!("../fixtures/jwt_signing_key.pem");

pub fn stream_config(instance_url: &str, topics: &[&str]) -> StreamConfig {
    stream_config_with(StreamAuth::Token(credentials(instance_url)), topics)
}

/// Streaming settings that sign in at `auth_server` with a JWT assertion.
pub fn jwt_stream_config(auth_server: &str, topics: &[&str]) -> StreamConfig {
    stream_config_with(
        StreamAuth::Jwt(JwtCredentials {
            cert_key: SIGNING_KEY.to_string(),
            client_id: "3MVG9.client".to_string(),
            user: "integration@acme.com".to_string(),
            auth_server: auth_server.to_string(),
        }),
        topics,
    )
}

fn stream_config_with(auth: StreamAuth, topics: &[&str]) -> StreamConfig {
    StreamConfig {
        auth,
        api_version: "48.0".to_string(),
        subscriptions: topics.iter().map(|t| Subscription::new(*t, -1)).collect(),
        connect_timeout: Duration::from_secs(5),
        backoff: BackoffConfig {
            initial: Duration::from_millis(20),
            max: Duration::from_millis(100),
        },
    }
}
