use reqwest::{Certificate, Client};
use std::time::Duration;

use crate::domain::errors::AdapterError;
use crate::domain::models::TlsConfig;

/// Settings for the single outbound HTTP client an adapter process owns.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub tls: TlsConfig,
    /// TCP connect timeout. Request timeouts are set per call.
    pub connect_timeout: Duration,
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            tls: TlsConfig::default(),
            connect_timeout: Duration::from_secs(10),
            pool_max_idle_per_host: 10,
        }
    }
}

/// Build the shared HTTP client.
///
/// TLS trust is fixed here. A configured CA certificate becomes the only
/// trusted root, replacing the built-in ones, and `skip_verify` is then
/// ignored.
pub fn build_client(config: &HttpClientConfig) -> Result<Client, AdapterError> {
    let mut builder = Client::builder()
        .connect_timeout(config.connect_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .tcp_nodelay(true)
        .user_agent(concat!("cloudevent-sources/", env!("CARGO_PKG_VERSION")));

    match &config.tls.ca_certificate {
        Some(pem) => {
            let certificate = Certificate::from_pem(pem.as_bytes()).map_err(|e| {
                AdapterError::Configuration(format!("invalid CA certificate: {e}"))
            })?;
            builder = builder
                .tls_built_in_root_certs(false)
                .add_root_certificate(certificate);
        }
        None if config.tls.skip_verify => {
            builder = builder.danger_accept_invalid_certs(true);
        }
        None => {}
    }

    builder
        .build()
        .map_err(|e| AdapterError::Configuration(format!("failed to build HTTP client: {e}")))
}
