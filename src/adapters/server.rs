//! HTTP listener lifecycle shared by the webhook receiver and the poller's
//! liveness endpoint.

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::{AdapterError, AdapterResult};

/// How long in-flight requests may drain after cancellation.
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Listening,
    ShuttingDown,
    Stopped,
}

/// Publishes listener state transitions to any number of observers.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: Arc<watch::Sender<LifecycleState>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Starting);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> LifecycleState {
        *self.state.borrow()
    }

    fn set(&self, state: LifecycleState) {
        self.state.send_replace(state);
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Liveness handler: always 200, `text/plain`.
pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "ok",
    )
}

/// Bind a listener on all interfaces.
pub async fn bind(port: u16) -> AdapterResult<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr)
        .await
        .map_err(|e| AdapterError::Server(format!("failed to bind {addr}: {e}")))
}

/// Serve `router` until `shutdown` is cancelled or the listener fails.
///
/// After cancellation, new connections are refused and in-flight requests
/// get `grace` to finish before the server is abandoned. A clean shutdown
/// returns `Ok(())`.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
    grace: Duration,
    lifecycle: &Lifecycle,
) -> AdapterResult<()> {
    let addr = listener
        .local_addr()
        .map_err(|e| AdapterError::Server(e.to_string()))?;

    let signal = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await
    });

    lifecycle.set(LifecycleState::Listening);
    tracing::info!(%addr, "HTTP server listening");

    tokio::select! {
        result = &mut server => {
            lifecycle.set(LifecycleState::Stopped);
            return flatten(result);
        }
        () = shutdown.cancelled() => {}
    }

    lifecycle.set(LifecycleState::ShuttingDown);
    tracing::info!(%addr, grace_secs = grace.as_secs(), "HTTP server draining");

    let outcome = match tokio::time::timeout(grace, &mut server).await {
        Ok(result) => flatten(result),
        Err(_) => {
            server.abort();
            Err(AdapterError::ShutdownTimeout(grace))
        }
    };

    lifecycle.set(LifecycleState::Stopped);
    outcome
}

fn flatten(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> AdapterResult<()> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(AdapterError::Server(e.to_string())),
        Err(e) => Err(AdapterError::Server(format!("server task failed: {e}"))),
    }
}
