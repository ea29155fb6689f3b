pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod interval;

pub use config::{
    AdapterConfig, BackoffConfig, BasicAuth, Credentials, EventAttributes, JwtCredentials,
    NormalizerOptions, PollerConfig, SinkConfig, StreamAuth, StreamConfig, Subscription,
    TlsConfig, WebhookConfig, REPLAY_ALL_RETAINED, REPLAY_NEW_ONLY,
};
pub use dispatch::{DispatchError, DispatchResult};
pub use envelope::{Envelope, DATA_CONTENT_TYPE, SPEC_VERSION};
pub use interval::{IntervalError, PollingInterval};
