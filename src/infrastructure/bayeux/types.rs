//! Bayeux message shapes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const META_PREFIX: &str = "/meta";
pub const HANDSHAKE: &str = "/meta/handshake";
pub const CONNECT: &str = "/meta/connect";
pub const SUBSCRIBE: &str = "/meta/subscribe";
pub const UNSUBSCRIBE: &str = "/meta/unsubscribe";
pub const DISCONNECT: &str = "/meta/disconnect";

pub const BAYEUX_VERSION: &str = "1.0";
pub const LONG_POLLING: &str = "long-polling";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeRequest {
    pub channel: &'static str,
    pub version: &'static str,
    pub minimum_version: &'static str,
    pub supported_connection_types: [&'static str; 1],
}

impl Default for HandshakeRequest {
    fn default() -> Self {
        Self {
            channel: HANDSHAKE,
            version: BAYEUX_VERSION,
            minimum_version: BAYEUX_VERSION,
            supported_connection_types: [LONG_POLLING],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest<'a> {
    pub channel: &'static str,
    pub client_id: &'a str,
    pub subscription: &'a str,
    pub ext: Value,
}

impl<'a> SubscribeRequest<'a> {
    /// Subscribe to `topic`, starting after `replay_id`.
    pub fn new(client_id: &'a str, topic: &'a str, replay_id: i64) -> Self {
        let mut replay = Map::new();
        replay.insert(topic.to_string(), Value::from(replay_id));
        Self {
            channel: SUBSCRIBE,
            client_id,
            subscription: topic,
            ext: json!({ "replay": replay }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeRequest<'a> {
    pub channel: &'static str,
    pub client_id: &'a str,
    pub subscription: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest<'a> {
    pub channel: &'static str,
    pub client_id: &'a str,
    pub connection_type: &'static str,
}

impl<'a> ConnectRequest<'a> {
    pub const fn new(client_id: &'a str) -> Self {
        Self {
            channel: CONNECT,
            client_id,
            connection_type: LONG_POLLING,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectRequest<'a> {
    pub channel: &'static str,
    pub client_id: &'a str,
}

/// What the server asks the client to do after a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reconnect {
    Retry,
    Handshake,
    None,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advice {
    pub reconnect: Option<Reconnect>,
    /// Milliseconds the server may hold a long-poll
    pub timeout: Option<u64>,
    /// Milliseconds to wait before the next Connect
    pub interval: Option<i64>,
}

/// Any message received from the server, meta or data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub channel: String,
    #[serde(alias = "clientID", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successful: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice: Option<Advice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

impl Message {
    /// Protocol messages live under `/meta`; everything else is data.
    pub fn is_meta(&self) -> bool {
        self.channel.starts_with(META_PREFIX)
    }

    pub fn is_successful(&self) -> bool {
        self.successful == Some(true)
    }

    pub fn is_unsuccessful(&self) -> bool {
        self.successful == Some(false)
    }

    /// True when the server advises a fresh handshake.
    pub fn requires_handshake(&self) -> bool {
        self.advice
            .as_ref()
            .and_then(|a| a.reconnect)
            .is_some_and(|r| r == Reconnect::Handshake)
    }

    /// Replay position of a data message, when the server supplies one.
    pub fn replay_id(&self) -> Option<i64> {
        self.data
            .as_ref()
            .and_then(|d| d.pointer("/event/replayId"))
            .and_then(Value::as_i64)
    }

    /// Error text for diagnostics.
    pub fn error_text(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| "no error detail".to_string())
    }
}
