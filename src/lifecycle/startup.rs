//! Startup orchestration.
//!
//! Order: state layout → supervisor → sidecar monitor → config watcher →
//! HTTP listener. Any startup error is fatal.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{ConfigWatcher, GatewayConfig};
use crate::gateway::{GatewayServer, ReadinessCheck};
use crate::lifecycle::Shutdown;
use crate::observability::logging::LogLevelHandle;
use crate::reload::{ReloadTargets, Reloader};
use crate::sidecar::{ProbeSchedule, SidecarMonitor, Supervisor, SupervisorPolicy};
use crate::state::{LayoutError, StateLayout};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("ensure state layout: {0}")]
    Layout(#[from] LayoutError),
    #[error("bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("watch config file: {0}")]
    Watch(#[from] notify::Error),
    #[error("http server: {0}")]
    Serve(#[source] std::io::Error),
}

/// Optional wiring for a gateway run.
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Config file to watch; reloads are hot-applied when possible.
    pub config_path: Option<PathBuf>,
    /// Handle to the installed subscriber, for log level reloads.
    pub log_level: Option<LogLevelHandle>,
}

/// Bind the configured address and run the gateway until `shutdown` fires.
pub async fn run_gateway(
    config: GatewayConfig,
    options: RunOptions,
    shutdown: Shutdown,
) -> Result<(), StartupError> {
    let addr = config.gateway.bind_address.clone();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;
    run_gateway_on(listener, config, options, shutdown).await
}

/// Run the gateway on an already bound listener.
pub async fn run_gateway_on(
    listener: TcpListener,
    config: GatewayConfig,
    options: RunOptions,
    shutdown: Shutdown,
) -> Result<(), StartupError> {
    let layout = StateLayout::resolve(&config.state.dir, &config.state.agent_id)?;
    layout.ensure()?;
    tracing::info!(
        root = %layout.root_dir.display(),
        agent_id = %config.state.agent_id,
        "State layout ensured"
    );

    let supervisor = Arc::new(Supervisor::new(SupervisorPolicy::from(&config.supervisor)));
    let probe_schedule = ProbeSchedule::from(&config.sidecar).shared();

    let monitor_handle = if config.sidecar.enabled {
        let socket = config.sidecar_socket();
        tracing::info!(socket = %socket, "Supervising sidecar");
        let monitor = SidecarMonitor::from_config(supervisor.clone(), probe_schedule.clone(), &socket);
        Some(tokio::spawn(monitor.run(shutdown.subscribe())))
    } else {
        // Nothing to supervise.
        tracing::info!("Sidecar supervision disabled");
        supervisor.mark_healthy();
        None
    };

    // The watcher stops when this guard drops at the end of the function.
    let _watcher = match options.config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(&path);
            let guard = watcher.run()?;
            let targets = ReloadTargets {
                supervisor: supervisor.clone(),
                probe_schedule,
                log_level: options.log_level,
            };
            let reloader = Reloader::new(config.clone(), targets);
            tokio::spawn(reloader.run(updates, shutdown.subscribe()));
            Some(guard)
        }
        None => None,
    };

    let readiness: ReadinessCheck = Arc::new(move || layout.is_ready());
    let server = GatewayServer::new(&config, supervisor, readiness);

    let local_addr: Option<SocketAddr> = listener.local_addr().ok();
    tracing::info!(address = ?local_addr, "Gateway listening");

    let result = server.run(listener, shutdown.subscribe()).await;

    // Stop the background tasks even when the server exits on its own.
    shutdown.trigger();
    if let Some(handle) = monitor_handle {
        let _ = handle.await;
    }

    result.map_err(StartupError::Serve)
}
