//! OAuth 2.0 JWT bearer sign-in.
//!
//! Signs a short-lived RS256 assertion with the configured private key and
//! exchanges it at `{auth_server}/services/oauth2/token` for a bearer token
//! and the instance URL that token is valid for.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::errors::BayeuxError;
use crate::domain::models::{Credentials, JwtCredentials};

/// Grant type for the JWT bearer flow (RFC 7523).
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

const TOKEN_PATH: &str = "/services/oauth2/token";

/// Authorization servers reject assertions valid for more than 3 minutes.
const ASSERTION_LIFETIME_SECS: i64 = 180;

const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    sub: String,
    aud: String,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    instance_url: String,
}

/// Exchanges a signed assertion for [`Credentials`].
pub struct JwtAuthenticator {
    http: Client,
    key: EncodingKey,
    issuer: String,
    subject: String,
    audience: String,
    token_url: Url,
}

impl JwtAuthenticator {
    /// Parse the signing key and the token endpoint up front so that bad
    /// material fails at startup rather than on the first refresh.
    pub fn new(http: Client, credentials: &JwtCredentials) -> Result<Self, BayeuxError> {
        let key = EncodingKey::from_rsa_pem(credentials.cert_key.as_bytes())
            .map_err(|e| BayeuxError::Authentication(format!("unable to parse PEM private key: {e}")))?;

        let audience = credentials.auth_server.trim_end_matches('/').to_string();
        let token_url = Url::parse(&format!("{audience}{TOKEN_PATH}"))
            .map_err(|e| BayeuxError::InvalidEndpoint(format!("{audience}{TOKEN_PATH}: {e}")))?;

        Ok(Self {
            http,
            key,
            issuer: credentials.client_id.clone(),
            subject: credentials.user.clone(),
            audience,
            token_url,
        })
    }

    pub const fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// Sign in and return a fresh bearer token.
    #[instrument(skip(self), fields(user = %self.subject))]
    pub async fn authenticate(&self) -> Result<Credentials, BayeuxError> {
        let assertion = self.assertion(Utc::now())?;

        let response = self
            .http
            .post(self.token_url.clone())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BayeuxError::Authentication(format!(
                "token endpoint answered HTTP {}: {}",
                status.as_u16(),
                body.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>()
            )));
        }

        let grant: TokenResponse = response.json().await.map_err(|e| {
            BayeuxError::Authentication(format!("could not decode token response: {e}"))
        })?;
        if grant.access_token.is_empty() || grant.instance_url.is_empty() {
            return Err(BayeuxError::Authentication(
                "token response lacks access_token or instance_url".to_string(),
            ));
        }

        debug!(instance_url = %grant.instance_url, "access token issued");
        Ok(Credentials::new(
            grant.instance_url.trim_end_matches('/'),
            grant.access_token,
        ))
    }

    fn assertion(&self, now: DateTime<Utc>) -> Result<String, BayeuxError> {
        let claims = Claims {
            iss: self.issuer.clone(),
            sub: self.subject.clone(),
            aud: self.audience.clone(),
            exp: (now + Duration::seconds(ASSERTION_LIFETIME_SECS)).timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| BayeuxError::Authentication(format!("could not sign assertion: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use chrono::TimeZone;

    const SIGNING_KEY: &str = include_str!("../../../tests/fixtures/jwt_signing_key.pem");

    fn credentials(cert_key: &str) -> JwtCredentials {
        JwtCredentials {
            cert_key: cert_key.to_string(),
            client_id: "3MVG9.client".to_string(),
            user: "integration@acme.com".to_string(),
            auth_server: "https://login.salesforce.com/".to_string(),
        }
    }

    #[test]
    fn test_assertion_claims() {
        let authenticator = JwtAuthenticator::new(Client::new(), &credentials(SIGNING_KEY)).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();

        let assertion = authenticator.assertion(now).unwrap();
        let parts: Vec<&str> = assertion.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header = jsonwebtoken::decode_header(&assertion).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);

        let claims: Claims = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(claims.iss, "3MVG9.client");
        assert_eq!(claims.sub, "integration@acme.com");
        assert_eq!(claims.aud, "https://login.salesforce.com");
        assert_eq!(claims.exp, now.timestamp() + 180);
    }

    #[test]
    fn test_token_url_is_derived_from_auth_server() {
        let authenticator = JwtAuthenticator::new(Client::new(), &credentials(SIGNING_KEY)).unwrap();
        assert_eq!(
            authenticator.token_url().as_str(),
            "https://login.salesforce.com/services/oauth2/token"
        );
    }

    #[test]
    fn test_invalid_key_is_rejected() {
        assert!(matches!(
            JwtAuthenticator::new(Client::new(), &credentials("not a key")),
            Err(BayeuxError::Authentication(_))
        ));
    }
}
