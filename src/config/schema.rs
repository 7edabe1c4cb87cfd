//! Configuration schema definitions.
//!
//! All sections derive Serde traits and fall back to defaults, so an empty
//! file is a valid configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP listener settings.
    pub gateway: ListenerConfig,

    /// On-disk state location.
    pub state: StateConfig,

    /// Sidecar connection and probing.
    pub sidecar: SidecarConfig,

    /// Restart policy for the sidecar supervisor.
    pub supervisor: SupervisorConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

impl GatewayConfig {
    /// Sidecar socket, defaulting to `<state dir>/run/agent-runtime.sock`.
    pub fn sidecar_socket(&self) -> String {
        match &self.sidecar.socket {
            Some(socket) => socket.clone(),
            None => self
                .state
                .dir
                .join("run")
                .join("agent-runtime.sock")
                .to_string_lossy()
                .into_owned(),
        }
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:18789").
    pub bind_address: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:18789".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// State directory configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StateConfig {
    /// Root of the state tree.
    pub dir: PathBuf,

    /// Agent whose sessions and memory live under `agents/<agent_id>`.
    pub agent_id: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        let home = std::env::var_os("HOME")
            .filter(|h| !h.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            dir: home.join(".forgemate"),
            agent_id: "main".to_string(),
        }
    }
}

/// Sidecar configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SidecarConfig {
    /// Supervise the sidecar at all.
    pub enabled: bool,

    /// `unix:/path`, a socket path, or `host:port`. Derived from the state
    /// dir when unset.
    pub socket: Option<String>,

    /// Seconds between liveness probes.
    pub probe_interval_secs: u64,

    /// Probe connect timeout in seconds.
    pub probe_timeout_secs: u64,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            socket: None,
            probe_interval_secs: 5,
            probe_timeout_secs: 2,
        }
    }
}

/// Sidecar restart policy.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Failures older than this are forgotten.
    pub failure_window_secs: u64,

    /// Breaker cooldown; uses `failure_window_secs` when unset.
    pub breaker_cooldown_secs: Option<u64>,

    /// Failures within the window that open the breaker.
    pub failure_threshold: u32,

    /// Restart backoff after the first failure, in milliseconds.
    pub base_backoff_ms: u64,

    /// Restart backoff ceiling, in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            failure_window_secs: 600,
            breaker_cooldown_secs: None,
            failure_threshold: 5,
            base_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
