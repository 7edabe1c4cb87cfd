//! ForgeMate gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌───────────────────────────────────────────────┐
//!                 │                  GATEWAY                      │
//!   HTTP client   │  ┌─────────┐   ┌─────────────────────────┐    │
//!  ───────────────┼─▶│  axum   │──▶│ /health /ready          │    │
//!                 │  │ server  │   │ /v1/connect/validate    │    │
//!                 │  └─────────┘   └───────────┬─────────────┘    │
//!                 │                            │ status()         │
//!                 │                            ▼                  │
//!                 │  ┌─────────┐   ┌─────────────────────────┐    │
//!   sidecar       │  │ sidecar │──▶│      Supervisor         │    │
//!  ◀──── probe ───┼──│ monitor │   │ failures/breaker/backoff│    │
//!                 │  └─────────┘   └─────────────────────────┘    │
//!                 │                                               │
//!                 │  config + watcher → reload policy             │
//!                 │  state layout (~/.forgemate)                  │
//!                 └───────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use forgemate_gateway::config::load_config;
use forgemate_gateway::lifecycle::{run_gateway, wait_for_signal, RunOptions, Shutdown};
use forgemate_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "forgemate-gateway", version)]
#[command(about = "ForgeMate gateway control plane", long_about = None)]
struct Args {
    /// TOML config file; watched for changes when given.
    #[arg(short, long, env = "FORGEMATE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref()).context("loading configuration")?;
    let log_level = logging::init_logging(&config.observability).context("initializing logging")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.gateway.bind_address,
        state_dir = %config.state.dir.display(),
        agent_id = %config.state.agent_id,
        sidecar_enabled = config.sidecar.enabled,
        "forgemate-gateway starting"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .context("parsing metrics address")?;
        metrics::init_metrics(addr).context("installing metrics exporter")?;
    }

    let shutdown = Shutdown::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_shutdown.trigger();
    });

    let options = RunOptions {
        config_path: args.config,
        log_level: Some(log_level),
    };
    run_gateway(config, options, shutdown)
        .await
        .context("gateway failed")?;

    tracing::info!("Shutdown complete");
    Ok(())
}
