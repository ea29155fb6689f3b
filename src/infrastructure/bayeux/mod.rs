//! Bayeux/CometD long-polling client
//!
//! Handshake, subscribe and connect calls over JSON POST with bearer
//! authentication, plus the session state they share and the JWT sign-in
//! that issues the bearer token.

pub mod auth;
pub mod client;
pub mod errors;
pub mod types;

pub use auth::JwtAuthenticator;
pub use client::{BayeuxClient, StreamSession};
pub use errors::BayeuxError;
pub use types::{Advice, Message, Reconnect};
