//! Normalize-then-dispatch pipeline shared by every front-end.

use std::sync::Arc;

use super::normalizer::Normalizer;
use crate::domain::errors::{AdapterError, AdapterResult};
use crate::domain::models::Envelope;
use crate::domain::ports::{EventDispatcher, Logger};
use crate::fields;

/// Turns raw payloads into envelopes and delivers them to the sink.
///
/// Delivery is best-effort: a send the sink does not acknowledge is
/// reported as [`AdapterError::DispatchNotAcknowledged`] and never retried.
pub struct EventPipeline {
    normalizer: Normalizer,
    dispatcher: Arc<dyn EventDispatcher>,
    logger: Arc<dyn Logger>,
}

impl EventPipeline {
    pub fn new(
        normalizer: Normalizer,
        dispatcher: Arc<dyn EventDispatcher>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            normalizer,
            dispatcher,
            logger,
        }
    }

    pub const fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Normalize a raw payload and dispatch the resulting envelope.
    pub async fn process(&self, raw: &[u8]) -> AdapterResult<Envelope> {
        let envelope = self.normalizer.normalize(raw)?;
        self.deliver(envelope).await
    }

    /// Dispatch an already normalized envelope.
    pub async fn deliver(&self, envelope: Envelope) -> AdapterResult<Envelope> {
        match self.dispatcher.dispatch(&envelope).await.into_result() {
            Ok(()) => {
                self.logger.debug(
                    "event dispatched",
                    fields! {
                        "id" => envelope.id,
                        "type" => envelope.event_type,
                        "subject" => envelope.subject,
                    },
                );
                Ok(envelope)
            }
            Err(err) => Err(AdapterError::DispatchNotAcknowledged(err.to_string())),
        }
    }
}
