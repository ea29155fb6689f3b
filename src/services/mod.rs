//! Service layer: normalization and the delivery pipeline.

pub mod normalizer;
pub mod pipeline;

pub use normalizer::{Normalizer, CORRELATION_EXTENSION};
pub use pipeline::EventPipeline;
