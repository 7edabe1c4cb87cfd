//! Config reload handling.
//!
//! # Data Flow
//! ```text
//! ConfigWatcher → new GatewayConfig
//!     → policy::changed_keys(current, new)
//!     → policy::decide_action(keys)
//!         hot-apply: pushed to ReloadTargets, new config becomes current
//!         restart:   nothing applied, current config kept
//! ```
//!
//! Hot-applied values reach:
//! - `supervisor.*` → [`Supervisor::set_policy`]
//! - `sidecar.probe_*` → the monitor's [`SharedSchedule`]
//! - `observability.log_level` → the subscriber's [`LogLevelHandle`]

pub mod policy;

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use crate::config::GatewayConfig;
use crate::observability::logging::LogLevelHandle;
use crate::sidecar::{ProbeSchedule, SharedSchedule, Supervisor, SupervisorPolicy};

pub use policy::{changed_keys, decide_action, ReloadAction, RESTART_KEYS};

/// Running components that take hot-applied settings.
#[derive(Clone)]
pub struct ReloadTargets {
    pub supervisor: Arc<Supervisor>,
    pub probe_schedule: SharedSchedule,
    pub log_level: Option<LogLevelHandle>,
}

impl ReloadTargets {
    fn apply(&self, config: &GatewayConfig) {
        self.supervisor
            .set_policy(SupervisorPolicy::from(&config.supervisor));
        self.probe_schedule
            .store(Arc::new(ProbeSchedule::from(&config.sidecar)));

        if let Some(levels) = &self.log_level {
            if let Err(e) = levels.set_level(&config.observability.log_level) {
                tracing::warn!(error = %e, "Keeping previous log level");
            }
        }
    }
}

/// Owns the applied configuration and the components it feeds.
pub struct Reloader {
    current: GatewayConfig,
    targets: ReloadTargets,
}

impl Reloader {
    pub fn new(current: GatewayConfig, targets: ReloadTargets) -> Self {
        Self { current, targets }
    }

    /// Configuration that is in effect.
    pub fn current(&self) -> &GatewayConfig {
        &self.current
    }

    /// Classify `new` against the current config and apply it if possible.
    pub fn apply(&mut self, new: GatewayConfig) -> ReloadAction {
        let keys = changed_keys(&self.current, &new);
        if keys.is_empty() {
            tracing::debug!("Config file rewritten without changes");
            return ReloadAction::HotApply;
        }

        let action = decide_action(&keys);
        match action {
            ReloadAction::HotApply => {
                self.targets.apply(&new);
                self.current = new;
                tracing::info!(changed = ?keys, "Config hot-applied");
            }
            ReloadAction::Restart => {
                tracing::warn!(changed = ?keys, "Config change requires a gateway restart, keeping current configuration");
            }
        }
        action
    }

    /// Consume config updates until shutdown.
    pub async fn run(
        mut self,
        mut updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                update = updates.recv() => match update {
                    Some(new) => {
                        self.apply(new);
                    }
                    None => break,
                },
                _ = shutdown.recv() => break,
            }
        }
        tracing::debug!("Reload loop stopped");
    }
}
