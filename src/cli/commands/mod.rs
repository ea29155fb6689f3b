//! CLI command implementations.

pub mod common;
pub mod poller;
pub mod stream;
pub mod webhook;

pub use common::{PayloadFieldArgs, SinkArgs};
pub use poller::PollerArgs;
pub use stream::StreamArgs;
pub use webhook::WebhookArgs;
