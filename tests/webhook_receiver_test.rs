mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use cloudevent_sources::adapters::{LifecycleState, WebhookReceiver};
use cloudevent_sources::domain::errors::AdapterError;
use cloudevent_sources::domain::models::{BasicAuth, NormalizerOptions, WebhookConfig};
use cloudevent_sources::domain::ports::Level;
use common::{attributes, pipeline, pipeline_with, RecordingDispatcher};

fn receiver(dispatcher: Arc<RecordingDispatcher>, basic_auth: Option<BasicAuth>) -> WebhookReceiver {
    let (pipeline, logger) = pipeline(dispatcher);
    WebhookReceiver::new(&WebhookConfig { port: 0, basic_auth }, pipeline, logger)
}

fn post(body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn post_with_auth(body: &'static str, authorization: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header(header::AUTHORIZATION, authorization)
        .body(Body::from(body))
        .unwrap()
}

fn basic(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_valid_body_dispatches_one_envelope() {
    let dispatcher = RecordingDispatcher::new();
    let router = receiver(dispatcher.clone(), None).router();
    let body = r#"{"ticket":{"id":42,"title":"Printer on fire"}}"#;

    let response = router.oneshot(post(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let reply: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();

    let sent = dispatcher.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].event_type, "dev.example.webhook");
    assert_eq!(sent[0].source, "default.hooks");
    assert_eq!(sent[0].data.as_deref(), Some(body.as_bytes()));
    assert_eq!(reply["id"], sent[0].id);
}

#[tokio::test]
async fn test_correct_credentials_are_accepted() {
    let dispatcher = RecordingDispatcher::new();
    let router = receiver(dispatcher.clone(), Some(BasicAuth::new("hook", "s3cret"))).router();

    let response = router
        .oneshot(post_with_auth(r#"{"a":1}"#, &basic("hook", "s3cret")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(dispatcher.sent().len(), 1);
}

#[tokio::test]
async fn test_wrong_credentials_are_rejected() {
    let dispatcher = RecordingDispatcher::new();
    let router = receiver(dispatcher.clone(), Some(BasicAuth::new("hook", "s3cret"))).router();

    let response = router
        .oneshot(post_with_auth(r#"{"a":1}"#, &basic("hook", "guess")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    assert!(dispatcher.sent().is_empty());
}

#[tokio::test]
async fn test_malformed_authorization_is_bad_request() {
    let dispatcher = RecordingDispatcher::new();
    let receiver = receiver(dispatcher.clone(), Some(BasicAuth::new("hook", "s3cret")));

    for authorization in ["Basic ???", "Bearer abc", "Basic"] {
        let response = receiver
            .router()
            .oneshot(post_with_auth(r#"{"a":1}"#, authorization))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{authorization}");
    }

    let response = receiver.router().oneshot(post(r#"{"a":1}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(dispatcher.sent().is_empty());
}

#[tokio::test]
async fn test_empty_body_is_bad_request() {
    let dispatcher = RecordingDispatcher::new();
    let receiver = receiver(dispatcher.clone(), Some(BasicAuth::new("hook", "s3cret")));

    let response = receiver.router().oneshot(post("")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = receiver
        .router()
        .oneshot(post_with_auth("", &basic("hook", "s3cret")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(dispatcher.sent().is_empty());
}

#[tokio::test]
async fn test_invalid_json_does_not_echo_body() {
    let dispatcher = RecordingDispatcher::new();
    let router = receiver(dispatcher.clone(), None).router();

    let response = router.oneshot(post("{\"card\": 4111-secret")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let text = body_text(response).await;
    assert!(!text.contains("4111"));
    assert!(dispatcher.sent().is_empty());
}

#[tokio::test]
async fn test_missing_correlation_field_is_rejected() {
    let dispatcher = RecordingDispatcher::new();
    let options = NormalizerOptions {
        correlation_field: Some("/ticket/id".to_string()),
        ..NormalizerOptions::default()
    };
    let (pipeline, logger) = pipeline_with(dispatcher.clone(), attributes(), options);
    let router = WebhookReceiver::new(&WebhookConfig { port: 0, basic_auth: None }, pipeline, logger.clone())
        .router();

    let response = router.oneshot(post(r#"{"ticket":{}}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(dispatcher.sent().is_empty());
    assert!(logger.contains(Level::Error, "could not parse webhook payload"));
}

#[tokio::test]
async fn test_dispatch_failure_is_server_error() {
    let dispatcher = RecordingDispatcher::rejecting();
    let router = receiver(dispatcher.clone(), None).router();

    let response = router.oneshot(post(r#"{"a":1}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "event could not be delivered");
    assert_eq!(dispatcher.sent().len(), 1);
}

#[tokio::test]
async fn test_health_is_always_ok() {
    let router = receiver(RecordingDispatcher::new(), Some(BasicAuth::new("hook", "s3cret"))).router();

    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_run_serves_until_cancelled() {
    let dispatcher = RecordingDispatcher::new();
    let receiver = receiver(dispatcher.clone(), None).with_grace_period(Duration::from_secs(2));
    let mut states = receiver.lifecycle();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();

    let server = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { receiver.run(listener, shutdown).await })
    };
    states
        .wait_for(|s| *s == LifecycleState::Listening)
        .await
        .unwrap();

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/"))
        .body(r#"{"hello":"world"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    shutdown.cancel();
    assert!(server.await.unwrap().is_ok());
    assert_eq!(*states.borrow(), LifecycleState::Stopped);
    assert_eq!(dispatcher.sent().len(), 1);
}

#[tokio::test]
async fn test_shutdown_is_bounded_by_grace_period() {
    let dispatcher = RecordingDispatcher::slow(Duration::from_secs(30));
    let receiver = receiver(dispatcher.clone(), None).with_grace_period(Duration::from_millis(200));
    let mut states = receiver.lifecycle();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();

    let server = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { receiver.run(listener, shutdown).await })
    };
    states
        .wait_for(|s| *s == LifecycleState::Listening)
        .await
        .unwrap();

    let in_flight = tokio::spawn(
        reqwest::Client::new()
            .post(format!("http://{addr}/"))
            .body(r#"{"hello":"world"}"#)
            .send(),
    );
    for _ in 0..100 {
        if !dispatcher.sent().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(dispatcher.sent().len(), 1);

    let started = std::time::Instant::now();
    shutdown.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(result, Err(AdapterError::ShutdownTimeout(_))), "{result:?}");
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(*states.borrow(), LifecycleState::Stopped);
    in_flight.abort();
}
