//! HTTP server setup.
//!
//! # Endpoints
//! - `GET /health`: liveness plus the sidecar supervisor snapshot
//! - `GET /ready`: 503 until the state directory exists
//! - `POST /v1/connect/validate`: connect-first handshake validation

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::gateway::protocol::{validate_connect_first, Frame};
use crate::sidecar::{Supervisor, SupervisorStatus};

pub const SERVICE_NAME: &str = "forgemate-gateway";
pub const PROTOCOL_VERSION: u32 = 1;

/// Readiness predicate evaluated on every `/ready` request.
pub type ReadinessCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub supervisor: Arc<Supervisor>,
    pub readiness: ReadinessCheck,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub started_at: DateTime<Utc>,
    pub sidecar: SupervisorStatus,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ok: bool,
    pub ready: bool,
}

#[derive(Debug, Serialize)]
pub struct ConnectAccepted {
    pub ok: bool,
    pub protocol: u32,
    pub message: &'static str,
}

/// HTTP server for the gateway control plane.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(config: &GatewayConfig, supervisor: Arc<Supervisor>, readiness: ReadinessCheck) -> Self {
        let state = AppState {
            supervisor,
            readiness,
            started_at: Utc::now(),
        };
        let router = Self::build_router(
            state,
            Duration::from_secs(config.gateway.request_timeout_secs),
        );
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/v1/connect/validate", post(connect_validate_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(TraceLayer::new_for_http())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until the shutdown broadcast fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        service: SERVICE_NAME,
        started_at: state.started_at,
        sidecar: state.supervisor.status(),
    })
}

async fn ready_handler(State(state): State<AppState>) -> Response {
    let ready = (state.readiness)();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(ReadyResponse { ok: ready, ready })).into_response()
}

async fn connect_validate_handler(body: Bytes) -> Response {
    let frame: Frame = match serde_json::from_slice(&body) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected malformed connect frame");
            return (StatusCode::BAD_REQUEST, "invalid frame JSON").into_response();
        }
    };

    match validate_connect_first(&frame) {
        Ok(params) => {
            tracing::info!(
                client_id = %params.client.id,
                role = %params.role.trim(),
                protocol = params.protocol,
                "Connect accepted"
            );
            Json(ConnectAccepted {
                ok: true,
                protocol: PROTOCOL_VERSION,
                message: "connect accepted",
            })
            .into_response()
        }
        Err(e) => {
            tracing::debug!(error = %e, "Connect rejected");
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}
