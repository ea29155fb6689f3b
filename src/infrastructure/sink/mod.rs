//! Delivery of envelopes to the downstream sink.

pub mod cloudevents;

pub use cloudevents::{binary_headers, CloudEventsHttpDispatcher};
