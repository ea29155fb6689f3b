//! Envelope normalization.
//!
//! Maps a raw producer payload into an [`Envelope`]. Normalization never
//! performs I/O and never reads the clock: two calls on the same payload
//! produce envelopes that differ only in `id`.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::errors::{AdapterError, AdapterResult};
use crate::domain::models::{Envelope, EventAttributes, NormalizerOptions};

/// Extension attribute carrying the payload's correlation value.
pub const CORRELATION_EXTENSION: &str = "correlationid";

/// Builds envelopes from raw payloads using the adapter's configured
/// attributes.
#[derive(Debug, Clone)]
pub struct Normalizer {
    attributes: EventAttributes,
    options: NormalizerOptions,
}

impl Normalizer {
    pub const fn new(attributes: EventAttributes, options: NormalizerOptions) -> Self {
        Self {
            attributes,
            options,
        }
    }

    pub const fn attributes(&self) -> &EventAttributes {
        &self.attributes
    }

    /// Normalize a raw JSON payload.
    ///
    /// The payload bytes are kept verbatim as envelope data.
    pub fn normalize(&self, raw: &[u8]) -> AdapterResult<Envelope> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(AdapterError::MalformedPayload("payload is empty".to_string()));
        }

        let value: Value = serde_json::from_slice(raw).map_err(|e| {
            AdapterError::MalformedPayload(format!("payload is not valid JSON: {e}"))
        })?;

        self.build(raw.to_vec(), &value)
    }

    /// Normalize a payload that has already been decoded, e.g. the `data`
    /// member of a streamed message.
    pub fn normalize_value(&self, value: &Value) -> AdapterResult<Envelope> {
        let data = serde_json::to_vec(value)?;
        self.build(data, value)
    }

    fn build(&self, data: Vec<u8>, value: &Value) -> AdapterResult<Envelope> {
        let mut envelope = Envelope::new(&self.attributes.event_type, &self.attributes.source)
            .with_data(data);
        envelope.extensions.clone_from(&self.attributes.extensions);

        if let Some(pointer) = &self.options.subject_field {
            envelope.subject = value.pointer(pointer).and_then(scalar_to_string);
        }

        if let Some(pointer) = &self.options.time_field {
            if let Some(raw_time) = value.pointer(pointer) {
                envelope.time = Some(parse_time(pointer, raw_time)?);
            }
        }

        if let Some(pointer) = &self.options.correlation_field {
            let correlation = value
                .pointer(pointer)
                .and_then(scalar_to_string)
                .ok_or_else(|| {
                    AdapterError::MalformedPayload(format!(
                        "correlation field {pointer} is absent"
                    ))
                })?;
            envelope
                .extensions
                .insert(CORRELATION_EXTENSION.to_string(), correlation);
        }

        Ok(envelope)
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_time(pointer: &str, value: &Value) -> AdapterResult<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| {
            AdapterError::MalformedPayload(format!(
                "time field {pointer} is not an RFC 3339 timestamp"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attributes() -> EventAttributes {
        EventAttributes::new("dev.example.webhook", "default.hook")
    }

    fn ticket_options() -> NormalizerOptions {
        NormalizerOptions {
            subject_field: Some("/title".to_string()),
            time_field: Some("/created_at".to_string()),
            correlation_field: Some("/id".to_string()),
        }
    }

    #[test]
    fn test_normalize_sets_attributes_and_data() {
        let normalizer = Normalizer::new(attributes(), NormalizerOptions::default());
        let raw = br#"{"hello": "world"}"#;

        let envelope = normalizer.normalize(raw).unwrap();

        assert_eq!(envelope.event_type, "dev.example.webhook");
        assert_eq!(envelope.source, "default.hook");
        assert_eq!(envelope.data.as_deref(), Some(&raw[..]));
        assert!(envelope.subject.is_none());
        assert!(envelope.time.is_none());
    }

    #[test]
    fn test_normalize_applies_extension_overrides() {
        let mut attrs = attributes();
        attrs.extensions.insert("tenant".to_string(), "acme".to_string());
        let normalizer = Normalizer::new(attrs, NormalizerOptions::default());

        let envelope = normalizer.normalize(b"[]").unwrap();
        assert_eq!(envelope.extensions.get("tenant").map(String::as_str), Some("acme"));
    }

    #[test]
    fn test_normalize_rejects_invalid_json() {
        let normalizer = Normalizer::new(attributes(), NormalizerOptions::default());

        assert!(matches!(
            normalizer.normalize(b"not json"),
            Err(AdapterError::MalformedPayload(_))
        ));
        assert!(matches!(
            normalizer.normalize(b"  "),
            Err(AdapterError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_normalize_extracts_ticket_fields() {
        let normalizer = Normalizer::new(attributes(), ticket_options());
        let raw = json!({
            "id": 35436,
            "title": "Printer on fire",
            "type": "incident",
            "created_at": "2024-05-01T10:15:00Z"
        });

        let envelope = normalizer
            .normalize(&serde_json::to_vec(&raw).unwrap())
            .unwrap();

        assert_eq!(envelope.subject.as_deref(), Some("Printer on fire"));
        assert_eq!(
            envelope.time.map(|t| t.to_rfc3339()),
            Some("2024-05-01T10:15:00+00:00".to_string())
        );
        assert_eq!(
            envelope.extensions.get(CORRELATION_EXTENSION).map(String::as_str),
            Some("35436")
        );
    }

    #[test]
    fn test_missing_correlation_field_is_malformed() {
        let normalizer = Normalizer::new(attributes(), ticket_options());

        let err = normalizer.normalize(br#"{"title": "no id"}"#).unwrap_err();
        assert!(matches!(err, AdapterError::MalformedPayload(msg) if msg.contains("/id")));
    }

    #[test]
    fn test_unparsable_time_is_malformed() {
        let normalizer = Normalizer::new(attributes(), ticket_options());

        let result = normalizer.normalize(br#"{"id": 1, "created_at": "yesterday"}"#);
        assert!(matches!(result, Err(AdapterError::MalformedPayload(_))));
    }

    #[test]
    fn test_absent_subject_is_not_an_error() {
        let options = NormalizerOptions {
            subject_field: Some("/title".to_string()),
            ..Default::default()
        };
        let normalizer = Normalizer::new(attributes(), options);

        let envelope = normalizer.normalize(br#"{"body": "x"}"#).unwrap();
        assert!(envelope.subject.is_none());
    }

    #[test]
    fn test_normalize_value_preserves_payload() {
        let normalizer = Normalizer::new(attributes(), NormalizerOptions::default());
        let data = json!({"event": {"replayId": 7}, "sobject": {"Id": "a00"}});

        let envelope = normalizer.normalize_value(&data).unwrap();
        assert_eq!(envelope.data_json(), Some(data));
    }

    #[test]
    fn test_normalize_twice_differs_only_in_id() {
        let normalizer = Normalizer::new(attributes(), ticket_options());
        let raw = br#"{"id": "a-1", "title": "t", "created_at": "2024-05-01T10:15:00Z"}"#;

        let first = normalizer.normalize(raw).unwrap();
        let second = normalizer.normalize(raw).unwrap();

        assert_ne!(first.id, second.id);
        assert!(first.same_content(&second));
    }
}
