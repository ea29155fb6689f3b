use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use thiserror::Error;

use crate::domain::errors::AdapterError;
use crate::domain::models::envelope::is_valid_extension_name;
use crate::domain::models::{
    BackoffConfig, BasicAuth, Credentials, IntervalError, JwtCredentials, NormalizerOptions,
    PollingInterval, SinkConfig, StreamAuth, Subscription,
};

/// Configuration error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required value: {0}")]
    MissingValue(&'static str),

    #[error("Invalid URL for {name}: {reason}")]
    InvalidUrl { name: &'static str, reason: String },

    #[error("Invalid interval: {0}")]
    InvalidInterval(#[from] IntervalError),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Invalid header entry '{0}'. Expected name:value")]
    InvalidHeader(String),

    #[error("Invalid subscription entry '{0}'. Expected /channel or /channel=replayId")]
    InvalidSubscription(String),

    #[error("Duplicate subscription: {0}")]
    DuplicateSubscription(String),

    #[error("Incomplete credentials: {0} requires both a username and a password")]
    IncompleteCredentials(&'static str),

    #[error("Invalid CloudEvent overrides: {0}")]
    InvalidOverrides(String),

    #[error(
        "Invalid extension name '{0}'. Must be lowercase alphanumeric, at most 20 characters, and not a core attribute"
    )]
    InvalidExtensionName(String),

    #[error("Conflicting credentials: {0}")]
    ConflictingCredentials(&'static str),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid timeout for {0}. Must be positive")]
    InvalidTimeout(&'static str),

    #[error(
        "Invalid backoff configuration: initial_ms ({0}) must be positive and not exceed max_ms ({1})"
    )]
    InvalidBackoff(u64, u64),
}

impl From<ConfigError> for AdapterError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct CeOverrides {
    #[serde(default)]
    extensions: BTreeMap<String, String>,
}

/// Converts raw environment values into validated configuration values.
///
/// Every function fails fast: a returned error means the process must not
/// start.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolve the event source, falling back to `"{namespace}.{name}"`.
    pub fn event_source(
        source_override: Option<&str>,
        namespace: &str,
        name: &str,
    ) -> Result<String, ConfigError> {
        if let Some(source) = source_override.map(str::trim).filter(|s| !s.is_empty()) {
            return Ok(source.to_string());
        }

        match (namespace.trim(), name.trim()) {
            ("", "") => Err(ConfigError::MissingValue("event source")),
            (namespace, "") => Ok(namespace.to_string()),
            ("", name) => Ok(name.to_string()),
            (namespace, name) => Ok(format!("{namespace}.{name}")),
        }
    }

    /// Require a non-blank value.
    pub fn required(value: &str, name: &'static str) -> Result<String, ConfigError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ConfigError::MissingValue(name));
        }
        Ok(value.to_string())
    }

    /// Validate an absolute http(s) URL.
    pub fn http_url(raw: &str, name: &'static str) -> Result<Url, ConfigError> {
        let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidUrl {
            name,
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                name,
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }
        Ok(url)
    }

    pub fn sink(raw_url: &str, timeout_secs: u64) -> Result<SinkConfig, ConfigError> {
        let url = Self::http_url(raw_url, "sink")?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("sink"));
        }
        Ok(SinkConfig {
            url: url.to_string(),
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Parse `K_CE_OVERRIDES`, e.g. `{"extensions": {"tenant": "acme"}}`.
    pub fn ce_overrides(raw: Option<&str>) -> Result<BTreeMap<String, String>, ConfigError> {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(BTreeMap::new());
        };

        let overrides: CeOverrides = serde_json::from_str(raw)
            .map_err(|e| ConfigError::InvalidOverrides(e.to_string()))?;

        if let Some(name) = overrides
            .extensions
            .keys()
            .find(|name| !is_valid_extension_name(name))
        {
            return Err(ConfigError::InvalidExtensionName(name.clone()));
        }
        Ok(overrides.extensions)
    }

    /// Build normalizer options from field names or JSON pointers.
    ///
    /// A bare field name such as `title` is treated as `/title`.
    pub fn normalizer_options(
        subject: Option<&str>,
        time: Option<&str>,
        correlation: Option<&str>,
    ) -> NormalizerOptions {
        NormalizerOptions {
            subject_field: subject.and_then(to_pointer),
            time_field: time.and_then(to_pointer),
            correlation_field: correlation.and_then(to_pointer),
        }
    }

    /// Parse `name:value` pairs separated by commas.
    pub fn headers(raw: Option<&str>) -> Result<Vec<(String, String)>, ConfigError> {
        let Some(raw) = raw else {
            return Ok(Vec::new());
        };

        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (name, value) = entry
                    .split_once(':')
                    .ok_or_else(|| ConfigError::InvalidHeader(entry.to_string()))?;
                let (name, value) = (name.trim(), value.trim());

                if HeaderName::from_bytes(name.as_bytes()).is_err()
                    || HeaderValue::from_str(value).is_err()
                {
                    return Err(ConfigError::InvalidHeader(entry.to_string()));
                }
                Ok((name.to_string(), value.to_string()))
            })
            .collect()
    }

    pub fn method(raw: &str) -> Result<Method, ConfigError> {
        let upper = raw.trim().to_uppercase();
        if upper.is_empty() {
            return Err(ConfigError::InvalidMethod(raw.to_string()));
        }
        Method::from_bytes(upper.as_bytes()).map_err(|_| ConfigError::InvalidMethod(raw.to_string()))
    }

    pub fn interval(raw: &str) -> Result<PollingInterval, ConfigError> {
        Ok(raw.parse::<PollingInterval>()?)
    }

    /// Basic credentials where both halves are mandatory once either is set.
    pub fn strict_basic_auth(
        username: Option<&str>,
        password: Option<&str>,
        owner: &'static str,
    ) -> Result<Option<BasicAuth>, ConfigError> {
        match (non_empty(username), non_empty(password)) {
            (None, None) => Ok(None),
            (Some(username), Some(password)) => Ok(Some(BasicAuth::new(username, password))),
            _ => Err(ConfigError::IncompleteCredentials(owner)),
        }
    }

    /// Basic credentials where either half may be empty.
    pub fn lenient_basic_auth(username: Option<&str>, password: Option<&str>) -> Option<BasicAuth> {
        match (non_empty(username), non_empty(password)) {
            (None, None) => None,
            (username, password) => Some(BasicAuth::new(
                username.unwrap_or_default(),
                password.unwrap_or_default(),
            )),
        }
    }

    /// Choose how the streaming client authenticates.
    ///
    /// A certificate key selects the JWT bearer flow, which then requires
    /// the client id, user and authorization server. Otherwise a static
    /// instance URL and access token are required.
    pub fn stream_auth(
        instance_url: Option<&str>,
        access_token: Option<&str>,
        cert_key: Option<&str>,
        client_id: Option<&str>,
        user: Option<&str>,
        auth_server: Option<&str>,
    ) -> Result<StreamAuth, ConfigError> {
        if non_blank(cert_key).is_none() {
            let instance_url = Self::http_url(
                non_blank(instance_url).ok_or(ConfigError::MissingValue("SALESFORCE_INSTANCE_URL"))?,
                "SALESFORCE_INSTANCE_URL",
            )?;
            let access_token =
                non_blank(access_token).ok_or(ConfigError::MissingValue("SALESFORCE_ACCESS_TOKEN"))?;
            return Ok(StreamAuth::Token(Credentials::new(
                instance_url.as_str().trim_end_matches('/'),
                access_token,
            )));
        }

        if non_blank(access_token).is_some() {
            return Err(ConfigError::ConflictingCredentials(
                "set either SALESFORCE_ACCESS_TOKEN or SALESFORCE_CERT_KEY, not both",
            ));
        }

        let auth_server = Self::http_url(
            non_blank(auth_server).ok_or(ConfigError::MissingValue("SALESFORCE_AUTH_SERVER"))?,
            "SALESFORCE_AUTH_SERVER",
        )?;
        Ok(StreamAuth::Jwt(JwtCredentials {
            cert_key: cert_key.unwrap_or_default().trim().to_string(),
            client_id: non_blank(client_id)
                .ok_or(ConfigError::MissingValue("SALESFORCE_CLIENT_ID"))?
                .to_string(),
            user: non_blank(user)
                .ok_or(ConfigError::MissingValue("SALESFORCE_USER"))?
                .to_string(),
            auth_server: auth_server.as_str().trim_end_matches('/').to_string(),
        }))
    }

    /// Parse comma separated subscriptions, each `topic` or `topic=replayId`.
    pub fn subscriptions(raw: &str, default_replay: i64) -> Result<Vec<Subscription>, ConfigError> {
        let mut seen = HashSet::new();
        let mut subscriptions = Vec::new();

        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (topic, replay_id) = match entry.split_once('=') {
                Some((topic, replay)) => {
                    let replay_id = replay
                        .trim()
                        .parse::<i64>()
                        .map_err(|_| ConfigError::InvalidSubscription(entry.to_string()))?;
                    (topic.trim(), replay_id)
                }
                None => (entry, default_replay),
            };

            if !topic.starts_with('/') || topic.len() < 2 || topic.starts_with("/meta") {
                return Err(ConfigError::InvalidSubscription(entry.to_string()));
            }
            if !seen.insert(topic.to_string()) {
                return Err(ConfigError::DuplicateSubscription(topic.to_string()));
            }
            subscriptions.push(Subscription::new(topic, replay_id));
        }

        if subscriptions.is_empty() {
            return Err(ConfigError::MissingValue("subscriptions"));
        }
        Ok(subscriptions)
    }

    pub fn backoff(initial_ms: u64, max_ms: u64) -> Result<BackoffConfig, ConfigError> {
        if initial_ms == 0 || initial_ms > max_ms {
            return Err(ConfigError::InvalidBackoff(initial_ms, max_ms));
        }
        Ok(BackoffConfig {
            initial: Duration::from_millis(initial_ms),
            max: Duration::from_millis(max_ms),
        })
    }

    pub fn log_level(raw: &str) -> Result<String, ConfigError> {
        let level = raw.trim().to_lowercase();
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(raw.to_string()));
        }
        Ok(level)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn to_pointer(field: &str) -> Option<String> {
    let field = field.trim();
    match field {
        "" => None,
        pointer if pointer.starts_with('/') => Some(pointer.to_string()),
        name => Some(format!("/{name}")),
    }
}
