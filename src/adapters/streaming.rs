//! Streaming adapter runtime.
//!
//! One task owns the Connect loop and is the only caller of
//! [`BayeuxClient::connect`]. It sends every outcome as a [`StreamItem`]
//! over a bounded channel to a consumer that normalizes and dispatches data
//! messages, so a slow sink never delays the next long-poll.

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::server::SHUTDOWN_GRACE_PERIOD;
use crate::domain::errors::{AdapterError, AdapterResult};
use crate::domain::models::{BackoffConfig, Subscription};
use crate::domain::ports::Logger;
use crate::fields;
use crate::infrastructure::bayeux::{BayeuxClient, BayeuxError, Message};
use crate::services::EventPipeline;

/// Default capacity of the channel between the Connect loop and the consumer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Outcome of the Connect loop, in the order it was produced.
#[derive(Debug)]
pub enum StreamItem {
    Data(Message),
    Error(BayeuxError),
    Stopped,
}

/// Capped exponential delay between consecutive failed Connect rounds.
pub struct ConnectBackoff {
    inner: ExponentialBackoff,
    max: Duration,
}

impl ConnectBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        let inner = ExponentialBackoffBuilder::new()
            .with_initial_interval(config.initial)
            .with_max_interval(config.max)
            .with_multiplier(2.0)
            .with_randomization_factor(0.25)
            .with_max_elapsed_time(None)
            .build();
        Self {
            inner,
            max: config.max,
        }
    }

    /// Delay before the next attempt; never longer than the configured cap.
    pub fn next_delay(&mut self) -> Duration {
        self.inner
            .next_backoff()
            .map_or(self.max, |delay| delay.min(self.max))
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }
}

/// Derive the envelope subject for a streamed message.
///
/// Change data capture events yield `{entity}/{changeType}`. Push topic
/// events yield `{entityName}/{eventType}`, or `{topic}/{eventType}` when
/// only the `sobject` record is present. Anything else yields the channel.
pub fn message_subject(message: &Message) -> String {
    let data = message.data.as_ref();

    let change_header = data.and_then(|d| d.pointer("/payload/ChangeEventHeader"));
    if let Some(header) = change_header {
        let entity = header.get("entityName").and_then(Value::as_str);
        let change = header.get("changeType").and_then(Value::as_str);
        if let (Some(entity), Some(change)) = (entity, change) {
            return format!("{entity}/{change}");
        }
    }

    let Some(event_type) = data.and_then(|d| d.pointer("/event/type")).and_then(Value::as_str)
    else {
        return message.channel.clone();
    };

    let entity = data
        .and_then(|d| d.pointer("/payload/entityName"))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty());
    if let Some(entity) = entity {
        return format!("{entity}/{event_type}");
    }

    if data.and_then(|d| d.get("sobject")).is_some() {
        let topic = message.channel.rsplit('/').next().unwrap_or(&message.channel);
        return format!("{topic}/{event_type}");
    }

    message.channel.clone()
}

/// Runs a Bayeux session and forwards its data messages to the pipeline.
pub struct StreamingAdapter {
    client: Arc<BayeuxClient>,
    pipeline: Arc<EventPipeline>,
    logger: Arc<dyn Logger>,
    subscriptions: Vec<Subscription>,
    backoff: BackoffConfig,
    channel_capacity: usize,
}

impl StreamingAdapter {
    pub fn new(
        client: Arc<BayeuxClient>,
        pipeline: Arc<EventPipeline>,
        logger: Arc<dyn Logger>,
        subscriptions: Vec<Subscription>,
        backoff: BackoffConfig,
    ) -> Self {
        Self {
            client,
            pipeline,
            logger,
            subscriptions,
            backoff,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Handshake and subscribe to every configured topic.
    ///
    /// Any failure here is fatal: the adapter must not stream with a
    /// session or subscription it believes failed.
    pub async fn start(&self) -> AdapterResult<()> {
        let client_id = self
            .client
            .handshake()
            .await
            .map_err(|e| AdapterError::SessionStart(e.to_string()))?;
        self.logger
            .info("handshake completed", fields! { "client_id" => client_id });

        for subscription in &self.subscriptions {
            self.client
                .subscribe(subscription)
                .await
                .map_err(|e| AdapterError::Subscription(e.to_string()))?;
            self.logger.info(
                "subscribed",
                fields! {
                    "topic" => subscription.topic,
                    "replay_id" => subscription.replay_id,
                },
            );
        }
        Ok(())
    }

    /// Start the session and stream until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) -> AdapterResult<()> {
        tokio::select! {
            result = self.start() => result?,
            () = shutdown.cancelled() => return Ok(()),
        }

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let producer_token = shutdown.child_token();
        let connect_loop = ConnectLoop {
            client: Arc::clone(&self.client),
            logger: Arc::clone(&self.logger),
            backoff: ConnectBackoff::new(self.backoff),
        };
        let mut producer = tokio::spawn(connect_loop.run(tx, producer_token.clone()));

        self.consume(rx, &shutdown).await;

        producer_token.cancel();
        match tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, &mut producer).await {
            Ok(Ok(())) => {
                self.logger.info("streaming stopped", fields!());
                Ok(())
            }
            Ok(Err(err)) => Err(AdapterError::Server(format!("connect loop failed: {err}"))),
            Err(_) => {
                producer.abort();
                Err(AdapterError::ShutdownTimeout(SHUTDOWN_GRACE_PERIOD))
            }
        }
    }

    async fn consume(&self, mut rx: mpsc::Receiver<StreamItem>, shutdown: &CancellationToken) {
        loop {
            let item = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                item = rx.recv() => item,
            };

            match item {
                Some(StreamItem::Data(message)) => self.forward(message).await,
                Some(StreamItem::Error(err)) => self.logger.error(
                    "streaming error",
                    fields! { "error" => err.to_string(), "transient" => err.is_transient() },
                ),
                Some(StreamItem::Stopped) | None => break,
            }
        }
    }

    /// Normalize and dispatch one data message; failures are logged and the
    /// message is dropped.
    pub async fn forward(&self, message: Message) {
        let subject = message_subject(&message);
        let Some(data) = message.data.as_ref() else {
            self.logger.warn(
                "dropping data message without payload",
                fields! { "channel" => message.channel },
            );
            return;
        };

        let envelope = match self.pipeline.normalizer().normalize_value(data) {
            Ok(envelope) => envelope.with_subject(subject),
            Err(err) => {
                self.logger.error(
                    "dropping malformed message",
                    fields! { "channel" => message.channel, "error" => err.to_string() },
                );
                return;
            }
        };

        if let Err(err) = self.pipeline.deliver(envelope).await {
            self.logger.error(
                "could not deliver streamed event",
                fields! {
                    "channel" => message.channel,
                    "replay_id" => message.replay_id(),
                    "error" => err.to_string(),
                },
            );
        }
    }
}

struct ConnectLoop {
    client: Arc<BayeuxClient>,
    logger: Arc<dyn Logger>,
    backoff: ConnectBackoff,
}

impl ConnectLoop {
    async fn run(mut self, tx: mpsc::Sender<StreamItem>, shutdown: CancellationToken) {
        loop {
            let outcome = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                outcome = self.client.connect() => outcome,
            };

            let failed = match outcome {
                Ok(messages) => match self.drain(messages, &tx, &shutdown).await {
                    Some(failed) => failed,
                    None => break,
                },
                Err(BayeuxError::NoSession) => match self.reestablish().await {
                    Ok(()) => false,
                    Err(err) => {
                        if !emit(&tx, StreamItem::Error(err), &shutdown).await {
                            break;
                        }
                        true
                    }
                },
                Err(err) => {
                    if !emit(&tx, StreamItem::Error(err), &shutdown).await {
                        break;
                    }
                    true
                }
            };

            if failed {
                let delay = self.backoff.next_delay();
                self.logger.debug(
                    "backing off before next connect",
                    fields! { "delay_ms" => u64::try_from(delay.as_millis()).unwrap_or(u64::MAX) },
                );
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
            } else {
                self.backoff.reset();
            }
        }

        let _ = tx.try_send(StreamItem::Stopped);
    }

    /// Route one Connect batch. Returns whether any message failed, or
    /// `None` once the consumer is gone or shutdown began.
    async fn drain(
        &self,
        messages: Vec<Message>,
        tx: &mpsc::Sender<StreamItem>,
        shutdown: &CancellationToken,
    ) -> Option<bool> {
        let mut failed = false;

        for message in messages {
            if message.is_meta() {
                if let Err(err) = self.handle_meta(&message).await {
                    failed = true;
                    if !emit(tx, StreamItem::Error(err), shutdown).await {
                        return None;
                    }
                }
            } else if !emit(tx, StreamItem::Data(message), shutdown).await {
                return None;
            }
        }

        Some(failed)
    }

    async fn handle_meta(&self, message: &Message) -> Result<(), BayeuxError> {
        if !message.is_unsuccessful() {
            self.logger
                .debug("meta message", fields! { "channel" => message.channel });
            return Ok(());
        }

        if message.requires_handshake() {
            self.logger.warn(
                "server advised a new handshake",
                fields! { "channel" => message.channel, "error" => message.error },
            );
            return self.reestablish().await;
        }

        Err(BayeuxError::MetaUnsuccessful {
            channel: message.channel.clone(),
            error: message.error_text(),
        })
    }

    /// Handshake and subscribe again to every recorded topic.
    async fn reestablish(&self) -> Result<(), BayeuxError> {
        let client_id = self.client.handshake().await?;
        self.client.resubscribe().await?;
        self.logger
            .info("session re-established", fields! { "client_id" => client_id });
        Ok(())
    }
}

/// Send an item unless the consumer is gone or shutdown began.
async fn emit(tx: &mpsc::Sender<StreamItem>, item: StreamItem, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = shutdown.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}
