//! Domain layer for the event source adapters
//!
//! Envelope and configuration models, the error taxonomy and the ports the
//! infrastructure layer implements.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{AdapterError, AdapterResult};
