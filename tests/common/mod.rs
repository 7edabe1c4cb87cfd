//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chrono::{DateTime, Utc};
use forgemate_gateway::config::GatewayConfig;
use forgemate_gateway::gateway::{AppState, GatewayServer};
use forgemate_gateway::sidecar::Supervisor;
use tempfile::TempDir;

/// Fixed timestamp `secs` after the epoch.
#[allow(dead_code)]
pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

/// Router with a fixed readiness answer.
#[allow(dead_code)]
pub fn test_router(supervisor: Arc<Supervisor>, ready: bool) -> Router {
    let state = AppState {
        supervisor,
        readiness: Arc::new(move || ready),
        started_at: Utc::now(),
    };
    GatewayServer::build_router(state, Duration::from_secs(5))
}

/// Config rooted in a fresh temp dir, listening on an ephemeral port.
#[allow(dead_code)]
pub fn test_config() -> (GatewayConfig, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = GatewayConfig::default();
    config.gateway.bind_address = "127.0.0.1:0".into();
    config.state.dir = dir.path().join(".forgemate");
    config.sidecar.probe_interval_secs = 1;
    config.sidecar.probe_timeout_secs = 1;
    (config, dir)
}

/// Retry connecting to `addr` until it accepts or five seconds pass.
#[allow(dead_code)]
pub async fn wait_until_listening(addr: SocketAddr) {
    for _ in 0..50 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("gateway at {addr} never started listening");
}
