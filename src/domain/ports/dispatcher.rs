use async_trait::async_trait;

use crate::domain::models::{DispatchResult, Envelope};

/// Port for delivering envelopes to the downstream sink
///
/// Each call is a single delivery attempt: implementations must not retry,
/// back off or queue. Success means the sink acknowledged receipt.
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    /// Send one envelope and report whether the sink acknowledged it
    async fn dispatch(&self, envelope: &Envelope) -> DispatchResult;
}
