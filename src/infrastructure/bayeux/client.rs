use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, Url};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::auth::JwtAuthenticator;
use super::errors::BayeuxError;
use super::types::{
    ConnectRequest, DisconnectRequest, HandshakeRequest, Message, SubscribeRequest,
    UnsubscribeRequest, CONNECT, DISCONNECT, HANDSHAKE, SUBSCRIBE, UNSUBSCRIBE,
};
use crate::domain::models::{Credentials, StreamAuth, StreamConfig, Subscription};

const MAX_ERROR_BODY_CHARS: usize = 1024;

/// Session state created by a successful handshake.
///
/// Every handshake starts with a fresh cookie jar so that site affinity
/// cookies from an expired session are never replayed. The jar and the
/// `clientId` replace the previous ones only once the handshake succeeds.
#[derive(Debug, Default)]
pub struct StreamSession {
    client_id: Option<String>,
    access_token: String,
    /// Topic to last known replay position
    subscriptions: BTreeMap<String, i64>,
    cookies: Arc<Jar>,
}

struct ActiveSession {
    client_id: String,
    jar: Arc<Jar>,
    token: String,
}

#[derive(Debug, Clone)]
struct Endpoints {
    handshake: Url,
    connect: Url,
    subscribe: Url,
    unsubscribe: Url,
    disconnect: Url,
}

impl Endpoints {
    fn new(base: &str) -> Result<Self, BayeuxError> {
        let url = |channel: &str| {
            Url::parse(&format!("{base}{channel}"))
                .map_err(|e| BayeuxError::InvalidEndpoint(format!("{base}{channel}: {e}")))
        };
        Ok(Self {
            handshake: url(HANDSHAKE)?,
            connect: url(CONNECT)?,
            subscribe: url(SUBSCRIBE)?,
            unsubscribe: url(UNSUBSCRIBE)?,
            disconnect: url(DISCONNECT)?,
        })
    }
}

/// Bayeux long-polling client.
///
/// Handshake takes the session write lock for the whole call, so a Connect
/// issued concurrently waits for the new `clientId` instead of reusing the
/// stale one.
pub struct BayeuxClient {
    http: Client,
    endpoints: Endpoints,
    connect_timeout: Duration,
    session: RwLock<StreamSession>,
    authenticator: Option<JwtAuthenticator>,
}

impl BayeuxClient {
    /// Create a client for `{instance_url}/cometd/{api_version}` that sends
    /// the given bearer token.
    pub fn new(
        http: Client,
        credentials: &Credentials,
        config: &StreamConfig,
    ) -> Result<Self, BayeuxError> {
        let base = format!(
            "{}/cometd/{}",
            credentials.instance_url.trim_end_matches('/'),
            config.api_version
        );

        Ok(Self {
            http,
            endpoints: Endpoints::new(&base)?,
            connect_timeout: config.connect_timeout,
            session: RwLock::new(StreamSession {
                access_token: credentials.access_token.clone(),
                ..StreamSession::default()
            }),
            authenticator: None,
        })
    }

    /// Resolve credentials as configured and create the client.
    ///
    /// With JWT credentials this signs in first, and the client signs in
    /// again whenever a handshake is refused with 401 or 403.
    pub async fn login(http: Client, config: &StreamConfig) -> Result<Self, BayeuxError> {
        match &config.auth {
            StreamAuth::Token(credentials) => Self::new(http, credentials, config),
            StreamAuth::Jwt(jwt) => {
                let authenticator = JwtAuthenticator::new(http.clone(), jwt)?;
                let credentials = authenticator.authenticate().await?;
                Ok(Self::new(http, &credentials, config)?.with_authenticator(authenticator))
            }
        }
    }

    /// Refresh the bearer token through `authenticator` when a handshake is
    /// refused.
    #[must_use]
    pub fn with_authenticator(mut self, authenticator: JwtAuthenticator) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Current session identifier, if a handshake has succeeded.
    pub async fn client_id(&self) -> Option<String> {
        self.session.read().await.client_id.clone()
    }

    /// Subscribed topics with their last known replay positions.
    pub async fn subscriptions(&self) -> Vec<Subscription> {
        self.session
            .read()
            .await
            .subscriptions
            .iter()
            .map(|(topic, replay_id)| Subscription::new(topic.clone(), *replay_id))
            .collect()
    }

    /// Start a new session and return its `clientId`.
    ///
    /// On failure the previous session is left in place, so the next
    /// Connect still reaches the server and receives its advice again.
    #[instrument(skip(self))]
    pub async fn handshake(&self) -> Result<String, BayeuxError> {
        let mut session = self.session.write().await;
        let jar = Arc::new(Jar::default());

        let attempt = self.post_handshake(&jar, &session.access_token).await;
        let messages = match (attempt, &self.authenticator) {
            (Err(err), Some(authenticator)) if err.is_unauthorized() => {
                warn!(error = %err, "handshake refused, signing in again");
                let credentials = authenticator.authenticate().await?;
                if credentials.instance_url != self.instance_origin() {
                    warn!(
                        instance_url = %credentials.instance_url,
                        "new token was issued for a different instance"
                    );
                }
                session.access_token = credentials.access_token;
                self.post_handshake(&jar, &session.access_token).await?
            }
            (attempt, _) => attempt?,
        };

        let first = messages
            .into_iter()
            .next()
            .ok_or(BayeuxError::EmptyHandshakeResponse)?;
        if first.is_unsuccessful() {
            return Err(BayeuxError::HandshakeRejected(first.error_text()));
        }
        let client_id = first
            .client_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                BayeuxError::HandshakeRejected("response carries no clientId".to_string())
            })?;

        debug!(client_id = %client_id, "handshake completed");
        session.client_id = Some(client_id.clone());
        session.cookies = jar;
        Ok(client_id)
    }

    async fn post_handshake(&self, jar: &Jar, token: &str) -> Result<Vec<Message>, BayeuxError> {
        self.post(
            HANDSHAKE,
            &self.endpoints.handshake,
            jar,
            token,
            &HandshakeRequest::default(),
            None,
        )
        .await
    }

    fn instance_origin(&self) -> String {
        self.endpoints
            .handshake
            .origin()
            .ascii_serialization()
    }

    /// Subscribe to one topic. A response marked unsuccessful is an error.
    #[instrument(skip(self), fields(topic = %subscription.topic))]
    pub async fn subscribe(&self, subscription: &Subscription) -> Result<(), BayeuxError> {
        let active = self.active_session().await?;

        let request =
            SubscribeRequest::new(&active.client_id, &subscription.topic, subscription.replay_id);
        let messages = self
            .post(
                SUBSCRIBE,
                &self.endpoints.subscribe,
                &active.jar,
                &active.token,
                &request,
                None,
            )
            .await?;

        if messages.is_empty() {
            return Err(BayeuxError::EmptySubscribeResponse(
                subscription.topic.clone(),
            ));
        }
        if let Some(failed) = messages.iter().find(|m| m.is_unsuccessful()) {
            return Err(BayeuxError::SubscriptionFailed {
                topic: subscription.topic.clone(),
                error: failed.error_text(),
            });
        }

        self.session
            .write()
            .await
            .subscriptions
            .insert(subscription.topic.clone(), subscription.replay_id);
        Ok(())
    }

    /// Subscribe again to every recorded topic, resuming from the last
    /// replay position seen on each.
    pub async fn resubscribe(&self) -> Result<(), BayeuxError> {
        for subscription in self.subscriptions().await {
            self.subscribe(&subscription).await?;
        }
        Ok(())
    }

    /// Issue one long-poll and return the batch of messages it produced.
    ///
    /// An empty batch is not an error.
    pub async fn connect(&self) -> Result<Vec<Message>, BayeuxError> {
        let active = self.active_session().await?;

        let messages = self
            .post(
                CONNECT,
                &self.endpoints.connect,
                &active.jar,
                &active.token,
                &ConnectRequest::new(&active.client_id),
                Some(self.connect_timeout),
            )
            .await?;

        self.record_replay_positions(&messages).await;
        Ok(messages)
    }

    /// Stop receiving messages for `topic`.
    pub async fn unsubscribe(&self, topic: &str) -> Result<(), BayeuxError> {
        let active = self.active_session().await?;

        let request = UnsubscribeRequest {
            channel: UNSUBSCRIBE,
            client_id: &active.client_id,
            subscription: topic,
        };
        let messages = self
            .post(
                UNSUBSCRIBE,
                &self.endpoints.unsubscribe,
                &active.jar,
                &active.token,
                &request,
                None,
            )
            .await?;
        ensure_successful(&messages)?;

        self.session.write().await.subscriptions.remove(topic);
        Ok(())
    }

    /// End the session. Recorded subscriptions are forgotten.
    pub async fn disconnect(&self) -> Result<(), BayeuxError> {
        let active = self.active_session().await?;

        let request = DisconnectRequest {
            channel: DISCONNECT,
            client_id: &active.client_id,
        };
        let messages = self
            .post(
                DISCONNECT,
                &self.endpoints.disconnect,
                &active.jar,
                &active.token,
                &request,
                None,
            )
            .await?;

        let mut session = self.session.write().await;
        session.client_id = None;
        session.subscriptions.clear();
        drop(session);

        ensure_successful(&messages)
    }

    async fn active_session(&self) -> Result<ActiveSession, BayeuxError> {
        let session = self.session.read().await;
        let client_id = session.client_id.clone().ok_or(BayeuxError::NoSession)?;
        Ok(ActiveSession {
            client_id,
            jar: Arc::clone(&session.cookies),
            token: session.access_token.clone(),
        })
    }

    async fn record_replay_positions(&self, messages: &[Message]) {
        let positions: Vec<(&str, i64)> = messages
            .iter()
            .filter(|m| !m.is_meta())
            .filter_map(|m| m.replay_id().map(|id| (m.channel.as_str(), id)))
            .collect();
        if positions.is_empty() {
            return;
        }

        let mut session = self.session.write().await;
        for (channel, replay_id) in positions {
            if let Some(position) = session.subscriptions.get_mut(channel) {
                *position = replay_id;
            }
        }
    }

    async fn post<T: Serialize + Sync>(
        &self,
        channel: &'static str,
        url: &Url,
        jar: &Jar,
        token: &str,
        body: &T,
        timeout: Option<Duration>,
    ) -> Result<Vec<Message>, BayeuxError> {
        let mut request = self.http.post(url.clone()).bearer_auth(token).json(body);
        if let Some(cookies) = jar.cookies(url) {
            request = request.header(COOKIE, cookies);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;

        let mut set_cookies = response.headers().get_all(SET_COOKIE).iter();
        jar.set_cookies(&mut set_cookies, url);

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(BayeuxError::Protocol {
                channel,
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes)
                    .chars()
                    .take(MAX_ERROR_BODY_CHARS)
                    .collect(),
            });
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn ensure_successful(messages: &[Message]) -> Result<(), BayeuxError> {
    match messages.iter().find(|m| m.is_unsuccessful()) {
        Some(failed) => Err(BayeuxError::MetaUnsuccessful {
            channel: failed.channel.clone(),
            error: failed.error_text(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::BackoffConfig;

    fn config(instance_url: &str) -> StreamConfig {
        StreamConfig {
            auth: StreamAuth::Token(Credentials::new(instance_url, "token")),
            api_version: "48.0".to_string(),
            subscriptions: vec![Subscription::new("/topic/Invoices", -2)],
            connect_timeout: Duration::from_secs(120),
            backoff: BackoffConfig::default(),
        }
    }

    #[test]
    fn test_endpoints() {
        let config = config("https://acme.my.salesforce.com/");
        let StreamAuth::Token(credentials) = &config.auth else {
            unreachable!()
        };
        let client = BayeuxClient::new(Client::new(), credentials, &config).unwrap();

        assert_eq!(
            client.endpoints.handshake.as_str(),
            "https://acme.my.salesforce.com/cometd/48.0/meta/handshake"
        );
        assert_eq!(
            client.endpoints.connect.as_str(),
            "https://acme.my.salesforce.com/cometd/48.0/meta/connect"
        );
    }

    #[test]
    fn test_invalid_instance_url() {
        let config = config("not a url");
        let credentials = Credentials::new("not a url", "token");
        assert!(matches!(
            BayeuxClient::new(Client::new(), &credentials, &config),
            Err(BayeuxError::InvalidEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_calls_without_session_fail() {
        let client = BayeuxClient::login(Client::new(), &config("https://acme.my.salesforce.com"))
            .await
            .unwrap();

        assert!(client.client_id().await.is_none());
        assert!(matches!(client.connect().await, Err(BayeuxError::NoSession)));
        assert!(matches!(
            client.subscribe(&Subscription::new("/topic/A", -1)).await,
            Err(BayeuxError::NoSession)
        ));
    }
}
