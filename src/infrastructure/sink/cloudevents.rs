//! CloudEvents v1.0 HTTP binding, binary content mode.
//!
//! Attributes travel as `ce-*` headers and the envelope data is the request
//! body. Any 2xx response is the sink's acknowledgement.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Url};
use std::fmt::Write as _;
use std::time::Duration;

use crate::domain::errors::AdapterError;
use crate::domain::models::envelope::is_core_attribute;
use crate::domain::models::{
    DispatchError, DispatchResult, Envelope, SinkConfig, DATA_CONTENT_TYPE, SPEC_VERSION,
};
use crate::domain::ports::EventDispatcher;

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Delivers envelopes to the configured sink over HTTP.
#[derive(Debug, Clone)]
pub struct CloudEventsHttpDispatcher {
    http: Client,
    url: Url,
    timeout: Duration,
}

impl CloudEventsHttpDispatcher {
    pub fn new(http: Client, sink: &SinkConfig) -> Result<Self, AdapterError> {
        let url = Url::parse(&sink.url)
            .map_err(|e| AdapterError::Configuration(format!("invalid sink URL: {e}")))?;
        Ok(Self {
            http,
            url,
            timeout: sink.timeout,
        })
    }
}

#[async_trait]
impl EventDispatcher for CloudEventsHttpDispatcher {
    async fn dispatch(&self, envelope: &Envelope) -> DispatchResult {
        let headers = match binary_headers(envelope, Utc::now()) {
            Ok(headers) => headers,
            Err(err) => return DispatchResult::failed(err),
        };

        let mut request = self
            .http
            .post(self.url.clone())
            .headers(headers)
            .timeout(self.timeout);
        if let Some(data) = &envelope.data {
            request = request.body(data.clone());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => return DispatchResult::failed(DispatchError::Transport(err.to_string())),
        };

        let status = response.status();
        if status.is_success() {
            return DispatchResult::acknowledged();
        }

        let body = response.text().await.unwrap_or_default();
        DispatchResult::failed(DispatchError::Rejected {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        })
    }
}

/// Render the binary-mode headers for an envelope.
///
/// Envelopes without a time are stamped with `now`. Extensions named after
/// a core attribute are left out so they can never replace it.
pub fn binary_headers(envelope: &Envelope, now: DateTime<Utc>) -> Result<HeaderMap, DispatchError> {
    let mut headers = HeaderMap::new();
    let time = envelope
        .time
        .unwrap_or(now)
        .to_rfc3339_opts(SecondsFormat::AutoSi, true);

    insert(&mut headers, "ce-specversion", SPEC_VERSION)?;
    insert(&mut headers, "ce-id", &envelope.id)?;
    insert(&mut headers, "ce-type", &envelope.event_type)?;
    insert(&mut headers, "ce-source", &envelope.source)?;
    insert(&mut headers, "ce-time", &time)?;
    if let Some(subject) = &envelope.subject {
        insert(&mut headers, "ce-subject", subject)?;
    }
    for (name, value) in &envelope.extensions {
        if is_core_attribute(name) {
            continue;
        }
        insert(&mut headers, &format!("ce-{name}"), value)?;
    }
    if envelope.data.is_some() {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(DATA_CONTENT_TYPE));
    }

    Ok(headers)
}

fn insert(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), DispatchError> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| DispatchError::Encoding(format!("{name}: {e}")))?;
    let value = HeaderValue::from_str(&encode_header_value(value))
        .map_err(|e| DispatchError::Encoding(format!("{name}: {e}")))?;
    headers.insert(name, value);
    Ok(())
}

/// Percent-encode characters that may not appear verbatim in a header value.
fn encode_header_value(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for c in value.chars() {
        if (' '..='~').contains(&c) && c != '%' && c != '"' {
            encoded.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                let _ = write!(encoded, "%{byte:02X}");
            }
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_binary_headers() {
        let envelope = Envelope::new("dev.example.created", "prod.hook")
            .with_subject("tickets/7")
            .with_extension("tenant", "acme")
            .with_data(b"{}".to_vec());
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 15, 0).unwrap();

        let headers = binary_headers(&envelope, now).unwrap();

        assert_eq!(headers["ce-specversion"], "1.0");
        assert_eq!(headers["ce-id"], envelope.id.as_str());
        assert_eq!(headers["ce-type"], "dev.example.created");
        assert_eq!(headers["ce-source"], "prod.hook");
        assert_eq!(headers["ce-subject"], "tickets/7");
        assert_eq!(headers["ce-tenant"], "acme");
        assert_eq!(headers["ce-time"], "2024-05-01T10:15:00Z");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_binary_headers_keep_envelope_time() {
        let time = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let envelope = Envelope::new("t", "s").with_time(time);

        let headers = binary_headers(&envelope, Utc::now()).unwrap();

        assert_eq!(headers["ce-time"], "2020-01-02T03:04:05Z");
        assert!(headers.get("ce-subject").is_none());
        assert!(headers.get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_extensions_cannot_replace_core_attributes() {
        let envelope = Envelope::new("dev.example.created", "prod.hook")
            .with_extension("id", "fixed")
            .with_extension("type", "overridden")
            .with_extension("specversion", "0.3")
            .with_extension("tenant", "acme");

        let headers = binary_headers(&envelope, Utc::now()).unwrap();

        assert_eq!(headers["ce-id"], envelope.id.as_str());
        assert_eq!(headers["ce-type"], "dev.example.created");
        assert_eq!(headers["ce-specversion"], "1.0");
        assert_eq!(headers["ce-tenant"], "acme");
        assert_eq!(headers.get_all("ce-id").iter().count(), 1);
    }

    #[test]
    fn test_encode_header_value() {
        assert_eq!(encode_header_value("plain/value 1"), "plain/value 1");
        assert_eq!(encode_header_value("100%"), "100%25");
        assert_eq!(encode_header_value("Café"), "Caf%C3%A9");
        assert_eq!(encode_header_value("line\nbreak"), "line%0Abreak");
    }
}
