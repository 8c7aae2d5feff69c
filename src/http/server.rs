//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, CORS, request ID, request tracking)
//! - Bind server to the configured address
//! - Drain in-flight requests on stop, abort after the configured deadline
//! - Report instance state for diagnostics

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::{extract::State, middleware, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::config::Config;
use crate::http::tracker::{track_requests, RequestTracker};
use crate::security::cors::cors_layer;
use crate::server::{ServerError, ServerFactory, ServerHandle};
use crate::version::{build_info, BuildInfo};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub instance: Uuid,
    pub started: Instant,
}

/// Where a server instance is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerPhase {
    Running,
    Stopped,
    Purged,
}

/// Builds [`HttpServer`] instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpServerFactory;

#[async_trait]
impl ServerFactory for HttpServerFactory {
    type Handle = HttpServer;

    async fn start(&self, config: Config) -> Result<HttpServer, ServerError> {
        HttpServer::start(config).await
    }
}

/// One running instance of the API host's HTTP service.
pub struct HttpServer {
    id: Uuid,
    config: Arc<Config>,
    local_addr: SocketAddr,
    started_at: SystemTime,
    started: Instant,
    tracker: RequestTracker,
    phase: ServerPhase,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl HttpServer {
    /// Bind the configured address and begin serving.
    pub async fn start(config: Config) -> Result<Self, ServerError> {
        let addr = config.bind_address().ok_or_else(|| ServerError::Address {
            ip: config.ip.clone(),
            port: config.port,
        })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        let id = Uuid::new_v4();
        let started = Instant::now();
        let tracker = RequestTracker::new();
        let state = AppState {
            instance: id,
            started,
        };
        let app = Self::build_router(&config, state, tracker.clone());

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    // A dropped sender also means stop.
                    let _ = shutdown_rx.wait_for(|stop| *stop).await;
                })
                .await
        });

        tracing::info!(
            server_id = %id,
            address = %local_addr,
            "HTTP server listening"
        );

        Ok(Self {
            id,
            config: Arc::new(config),
            local_addr,
            started_at: SystemTime::now(),
            started,
            tracker,
            phase: ServerPhase::Running,
            shutdown_tx,
            task: Some(task),
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &Config, state: AppState, tracker: RequestTracker) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/version", get(version_handler))
            .with_state(state)
            .layer(middleware::from_fn_with_state(tracker, track_requests))
            .layer(cors_layer(&config.cors))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Address actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn phase(&self) -> ServerPhase {
        self.phase
    }

    pub fn in_flight(&self) -> u64 {
        self.tracker.in_flight()
    }
}

#[async_trait]
impl ServerHandle for HttpServer {
    fn id(&self) -> Uuid {
        self.id
    }

    async fn stop(&mut self) {
        if self.phase != ServerPhase::Running {
            tracing::debug!(server_id = %self.id, "Server already stopped");
            return;
        }
        self.phase = ServerPhase::Stopped;
        self.shutdown_tx.send_replace(true);

        let Some(mut task) = self.task.take() else {
            return;
        };

        let deadline = self.config.shutdown_timeout();
        tracing::info!(
            server_id = %self.id,
            in_flight = self.tracker.in_flight(),
            timeout_secs = deadline.as_secs(),
            "Draining HTTP server"
        );

        match tokio::time::timeout(deadline, &mut task).await {
            Ok(Ok(Ok(()))) => tracing::info!(server_id = %self.id, "HTTP server stopped"),
            Ok(Ok(Err(e))) => tracing::error!(server_id = %self.id, error = %e, "HTTP server failed"),
            Ok(Err(e)) => tracing::error!(server_id = %self.id, error = %e, "HTTP server task failed"),
            Err(_) => {
                tracing::warn!(
                    server_id = %self.id,
                    in_flight = self.tracker.in_flight(),
                    "Drain deadline exceeded, aborting HTTP server"
                );
                task.abort();
                // Wait for the abort so the listener is closed before we return.
                let _ = task.await;
            }
        }
    }

    async fn purge(&mut self) {
        if self.phase == ServerPhase::Running {
            self.stop().await;
        }
        if self.phase == ServerPhase::Purged {
            return;
        }
        self.tracker.reset();
        self.phase = ServerPhase::Purged;
        tracing::info!(server_id = %self.id, "HTTP server purged");
    }

    fn snapshot(&self) -> Result<Vec<u8>, ServerError> {
        let started_at = self
            .started_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let snapshot = ServerSnapshot {
            id: self.id,
            phase: self.phase,
            address: self.local_addr,
            started_at,
            uptime_secs: self.started.elapsed().as_secs(),
            requests_served: self.tracker.served(),
            requests_in_flight: self.tracker.in_flight(),
            config: &self.config,
            build: build_info(),
        };
        Ok(serde_json::to_vec(&snapshot)?)
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            self.shutdown_tx.send_replace(true);
            task.abort();
        }
    }
}

/// Serialized form of [`HttpServer`] state.
#[derive(Serialize)]
struct ServerSnapshot<'a> {
    id: Uuid,
    phase: ServerPhase,
    address: SocketAddr,
    started_at: u64,
    uptime_secs: u64,
    requests_served: u64,
    requests_in_flight: u64,
    config: &'a Config,
    build: BuildInfo,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    instance: Uuid,
    uptime_secs: u64,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        instance: state.instance,
        uptime_secs: state.started.elapsed().as_secs(),
    })
}

async fn version_handler() -> Json<BuildInfo> {
    Json(build_info())
}
