//! The normalized event envelope emitted by every adapter.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// CloudEvents specification version carried by every envelope.
pub const SPEC_VERSION: &str = "1.0";

/// Content type of envelope data.
pub const DATA_CONTENT_TYPE: &str = "application/json";

/// Sink-independent representation of one external occurrence.
///
/// `id` and `event_type` are always set; `data`, when present, holds
/// valid JSON exactly as it was received from the producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Unique per emission
    pub id: String,
    pub event_type: String,
    /// URI-like identifier of the producer
    pub source: String,
    pub subject: Option<String>,
    pub time: Option<DateTime<Utc>>,
    pub data: Option<Vec<u8>>,
    /// Extension attributes; names are lowercase alphanumeric
    pub extensions: BTreeMap<String, String>,
}

impl Envelope {
    /// Create an envelope with a fresh id and no payload.
    pub fn new(event_type: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            source: source.into(),
            subject: None,
            time: None,
            data: None,
            extensions: BTreeMap::new(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_extension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extensions.insert(name.into(), value.into());
        self
    }

    /// Parse the payload back into a JSON value.
    pub fn data_json(&self) -> Option<Value> {
        self.data
            .as_deref()
            .and_then(|bytes| serde_json::from_slice(bytes).ok())
    }

    /// Compare every attribute except `id`.
    pub fn same_content(&self, other: &Self) -> bool {
        self.event_type == other.event_type
            && self.source == other.source
            && self.subject == other.subject
            && self.time == other.time
            && self.data == other.data
            && self.extensions == other.extensions
    }
}

/// Context attributes defined by CloudEvents v1.0. Extensions may not
/// reuse these names.
pub const CORE_ATTRIBUTES: [&str; 9] = [
    "specversion",
    "id",
    "type",
    "source",
    "subject",
    "time",
    "datacontenttype",
    "dataschema",
    "data",
];

pub fn is_core_attribute(name: &str) -> bool {
    CORE_ATTRIBUTES.contains(&name)
}

/// Returns true if `name` is a valid CloudEvents extension name.
pub fn is_valid_extension_name(name: &str) -> bool {
    !is_core_attribute(name)
        && !name.is_empty()
        && name.len() <= 20
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}
