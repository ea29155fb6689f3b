//! Event source front-ends.
//!
//! Each adapter turns an external event source into envelopes and hands
//! them to the shared [`EventPipeline`](crate::services::EventPipeline).

pub mod poller;
pub mod server;
pub mod streaming;
pub mod webhook;

pub use poller::{HttpPoller, PollRequest};
pub use server::{Lifecycle, LifecycleState, SHUTDOWN_GRACE_PERIOD};
pub use streaming::{message_subject, ConnectBackoff, StreamItem, StreamingAdapter};
pub use webhook::{WebhookReceiver, WebhookRejection};
