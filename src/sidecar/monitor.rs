//! Sidecar restart-control loop.
//!
//! # Responsibilities
//! - Periodically probe the sidecar endpoint
//! - Feed probe outcomes into the [`Supervisor`]
//! - Honor the breaker and restart backoff before probing again
//!
//! While an open breaker is cooling down, probes keep running but failures
//! are not recorded: a recovered sidecar still closes the breaker, and the
//! cooldown is measured from the failure that opened it.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::SidecarConfig;
use crate::observability::metrics;
use crate::sidecar::supervisor::Supervisor;

/// Error returned by a failed probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("connection failed: {0}")]
    Connect(#[from] std::io::Error),
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
}

/// A liveness check against the sidecar.
pub trait Probe: Send + Sync {
    fn probe(&self) -> impl Future<Output = Result<(), ProbeError>> + Send;
}

/// Where the sidecar listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidecarEndpoint {
    Unix(PathBuf),
    Tcp(String),
}

impl SidecarEndpoint {
    /// Parse `unix:/path`, a bare filesystem path, or `host:port`.
    pub fn parse(address: &str) -> Self {
        if let Some(path) = address.strip_prefix("unix:") {
            return SidecarEndpoint::Unix(PathBuf::from(path));
        }
        if address.contains('/') || address.contains('\\') {
            return SidecarEndpoint::Unix(PathBuf::from(address));
        }
        SidecarEndpoint::Tcp(address.to_string())
    }
}

/// Probes the sidecar by opening a connection to its endpoint.
#[derive(Debug, Clone)]
pub struct SocketProbe {
    endpoint: SidecarEndpoint,
}

impl SocketProbe {
    pub fn new(endpoint: SidecarEndpoint) -> Self {
        Self { endpoint }
    }
}

impl Probe for SocketProbe {
    async fn probe(&self) -> Result<(), ProbeError> {
        match &self.endpoint {
            #[cfg(unix)]
            SidecarEndpoint::Unix(path) => {
                tokio::net::UnixStream::connect(path).await?;
            }
            #[cfg(not(unix))]
            SidecarEndpoint::Unix(_) => {
                return Err(ProbeError::Connect(std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "unix sockets are not supported on this platform",
                )));
            }
            SidecarEndpoint::Tcp(addr) => {
                tokio::net::TcpStream::connect(addr.as_str()).await?;
            }
        }
        Ok(())
    }
}

/// Probe timing, swappable while the monitor runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSchedule {
    pub interval: Duration,
    pub timeout: Duration,
}

impl From<&SidecarConfig> for ProbeSchedule {
    fn from(config: &SidecarConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.probe_interval_secs),
            timeout: Duration::from_secs(config.probe_timeout_secs),
        }
    }
}

/// Probe schedule shared between the monitor and config reload.
pub type SharedSchedule = Arc<ArcSwap<ProbeSchedule>>;

impl ProbeSchedule {
    pub fn shared(self) -> SharedSchedule {
        Arc::new(ArcSwap::from_pointee(self))
    }
}

/// Result of one monitor iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Sidecar answered; probe again after the regular interval.
    Healthy,
    /// Sidecar failed; a restart may be attempted after the delay.
    RestartAfter(Duration),
    /// Sidecar failed and the breaker blocks restarts.
    RestartBlocked,
}

pub struct SidecarMonitor<P> {
    supervisor: Arc<Supervisor>,
    probe: P,
    schedule: SharedSchedule,
}

impl SidecarMonitor<SocketProbe> {
    pub fn from_config(supervisor: Arc<Supervisor>, schedule: SharedSchedule, socket: &str) -> Self {
        Self::new(supervisor, SocketProbe::new(SidecarEndpoint::parse(socket)), schedule)
    }
}

impl<P: Probe> SidecarMonitor<P> {
    pub fn new(supervisor: Arc<Supervisor>, probe: P, schedule: SharedSchedule) -> Self {
        Self {
            supervisor,
            probe,
            schedule,
        }
    }

    /// Current probe timing.
    pub fn schedule(&self) -> ProbeSchedule {
        **self.schedule.load()
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(schedule = ?self.schedule(), "Sidecar monitor starting");

        // First probe runs immediately.
        let mut delay = Duration::ZERO;
        loop {
            tokio::select! {
                _ = time::sleep(delay) => {
                    let outcome = self.check(Utc::now()).await;
                    delay = self.next_delay(outcome);
                }
                _ = shutdown.recv() => {
                    tracing::info!("Sidecar monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// How long to wait after `outcome` before the next probe.
    pub fn next_delay(&self, outcome: ProbeOutcome) -> Duration {
        match outcome {
            ProbeOutcome::Healthy | ProbeOutcome::RestartBlocked => self.schedule().interval,
            ProbeOutcome::RestartAfter(backoff) => backoff,
        }
    }

    /// Probe once and record the outcome as observed at `now`.
    pub async fn check(&self, now: DateTime<Utc>) -> ProbeOutcome {
        let timeout = self.schedule().timeout;
        let result = match time::timeout(timeout, self.probe.probe()).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(timeout)),
        };

        let outcome = match result {
            Ok(()) => {
                self.supervisor.mark_healthy();
                ProbeOutcome::Healthy
            }
            Err(e) if !self.supervisor.can_restart(now) => {
                tracing::debug!(error = %e, "Sidecar still down, breaker cooling down");
                ProbeOutcome::RestartBlocked
            }
            Err(e) => {
                // A failure after the cooldown is the trial restart; it may
                // reopen the breaker but the restart was already permitted.
                let cooled_down = self.supervisor.status().breaker_open;
                self.supervisor.mark_failed(now);
                metrics::record_sidecar_failure();

                if cooled_down || self.supervisor.can_restart(now) {
                    let backoff = self.supervisor.next_backoff();
                    tracing::warn!(error = %e, delay = ?backoff, "Sidecar probe failed, restart permitted after backoff");
                    ProbeOutcome::RestartAfter(backoff)
                } else {
                    tracing::error!(error = %e, "Sidecar probe failed, restart blocked by open breaker");
                    ProbeOutcome::RestartBlocked
                }
            }
        };

        metrics::record_sidecar_status(&self.supervisor.status());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sidecar::supervisor::{LifecycleState, SupervisorPolicy};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedProbe {
        results: Mutex<VecDeque<bool>>,
    }

    impl ScriptedProbe {
        fn new(results: &[bool]) -> Self {
            Self {
                results: Mutex::new(results.iter().copied().collect()),
            }
        }
    }

    impl Probe for ScriptedProbe {
        async fn probe(&self) -> Result<(), ProbeError> {
            let ok = self.results.lock().unwrap().pop_front().unwrap_or(false);
            if ok {
                Ok(())
            } else {
                Err(ProbeError::Timeout(Duration::from_millis(1)))
            }
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn every(secs: u64) -> SharedSchedule {
        ProbeSchedule {
            interval: Duration::from_secs(secs),
            timeout: Duration::from_secs(1),
        }
        .shared()
    }

    #[test]
    fn test_endpoint_parsing() {
        assert_eq!(
            SidecarEndpoint::parse("unix:/tmp/agent.sock"),
            SidecarEndpoint::Unix(PathBuf::from("/tmp/agent.sock"))
        );
        assert_eq!(
            SidecarEndpoint::parse("/var/run/agent.sock"),
            SidecarEndpoint::Unix(PathBuf::from("/var/run/agent.sock"))
        );
        assert_eq!(
            SidecarEndpoint::parse("127.0.0.1:50051"),
            SidecarEndpoint::Tcp("127.0.0.1:50051".to_string())
        );
    }

    #[tokio::test]
    async fn test_failures_back_off_then_block() {
        let supervisor = Arc::new(Supervisor::default());
        let monitor = SidecarMonitor::new(
            supervisor.clone(),
            ScriptedProbe::new(&[false; 5]),
            every(5),
        );

        let mut delays = Vec::new();
        for i in 0..4 {
            delays.push(monitor.check(at(100 + i)).await);
        }
        assert_eq!(
            delays,
            vec![
                ProbeOutcome::RestartAfter(Duration::from_secs(1)),
                ProbeOutcome::RestartAfter(Duration::from_secs(2)),
                ProbeOutcome::RestartAfter(Duration::from_secs(4)),
                ProbeOutcome::RestartAfter(Duration::from_secs(8)),
            ]
        );

        assert_eq!(monitor.check(at(104)).await, ProbeOutcome::RestartBlocked);
        assert_eq!(supervisor.status().state, LifecycleState::BreakerOpen);
    }

    #[tokio::test]
    async fn test_healthy_probe_recovers() {
        let supervisor = Arc::new(Supervisor::new(SupervisorPolicy {
            failure_threshold: 2,
            ..SupervisorPolicy::default()
        }));
        let monitor = SidecarMonitor::new(
            supervisor.clone(),
            ScriptedProbe::new(&[false, false, true]),
            every(5),
        );

        monitor.check(at(1)).await;
        assert_eq!(monitor.check(at(2)).await, ProbeOutcome::RestartBlocked);
        assert_eq!(monitor.check(at(3)).await, ProbeOutcome::Healthy);

        let status = supervisor.status();
        assert_eq!(status.state, LifecycleState::Running);
        assert_eq!(status.failure_count, 0);
        assert!(!status.breaker_open);
    }

    #[tokio::test]
    async fn test_breaker_cooldown_elapses_while_sidecar_stays_down() {
        let supervisor = Arc::new(Supervisor::new(SupervisorPolicy {
            failure_window: Duration::from_secs(60),
            breaker_cooldown: Duration::from_secs(30),
            failure_threshold: 3,
            ..SupervisorPolicy::default()
        }));
        let monitor = SidecarMonitor::new(supervisor.clone(), ScriptedProbe::new(&[]), every(5));

        // Follow the loop's own schedule on a simulated clock.
        let mut now = 0;
        let mut permitted = Vec::new();
        for _ in 0..12 {
            let outcome = monitor.check(at(now)).await;
            if let ProbeOutcome::RestartAfter(_) = outcome {
                permitted.push(now);
            }
            now += monitor.next_delay(outcome).as_secs() as i64;
        }

        // Opens at t=3; t=33 is exactly the cooldown, t=38 is past it.
        assert_eq!(permitted, vec![0, 1, 38]);
        let status = supervisor.status();
        assert_eq!(status.failure_count, 4);
        assert!(status.breaker_open);
        assert_eq!(status.breaker_opened_at, Some(at(38)));
    }

    #[tokio::test]
    async fn test_cooldown_equal_to_window_restarts_from_scratch() {
        let supervisor = Arc::new(Supervisor::new(SupervisorPolicy {
            failure_window: Duration::from_secs(30),
            breaker_cooldown: Duration::from_secs(30),
            failure_threshold: 2,
            ..SupervisorPolicy::default()
        }));
        let monitor = SidecarMonitor::new(supervisor.clone(), ScriptedProbe::new(&[]), every(10));

        monitor.check(at(0)).await;
        assert_eq!(monitor.check(at(1)).await, ProbeOutcome::RestartBlocked);
        for t in [11, 21, 31] {
            assert_eq!(monitor.check(at(t)).await, ProbeOutcome::RestartBlocked);
        }
        assert_eq!(supervisor.status().failure_count, 2);

        assert_eq!(
            monitor.check(at(41)).await,
            ProbeOutcome::RestartAfter(Duration::from_secs(1))
        );
        let status = supervisor.status();
        assert_eq!(status.failure_count, 1);
        assert_eq!(status.state, LifecycleState::Degraded);
    }

    #[tokio::test]
    async fn test_schedule_swap_changes_delay_and_timeout() {
        struct SlowProbe;
        impl Probe for SlowProbe {
            async fn probe(&self) -> Result<(), ProbeError> {
                time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }
        }

        let schedule = every(5);
        let monitor = SidecarMonitor::new(Arc::new(Supervisor::default()), SlowProbe, schedule.clone());
        assert_eq!(monitor.next_delay(ProbeOutcome::Healthy), Duration::from_secs(5));

        schedule.store(Arc::new(ProbeSchedule {
            interval: Duration::from_secs(2),
            timeout: Duration::from_millis(20),
        }));
        assert_eq!(monitor.next_delay(ProbeOutcome::RestartBlocked), Duration::from_secs(2));
        assert_eq!(
            monitor.check(at(0)).await,
            ProbeOutcome::RestartAfter(Duration::from_secs(1))
        );
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown() {
        let supervisor = Arc::new(Supervisor::default());
        let monitor = SidecarMonitor::new(
            supervisor.clone(),
            ScriptedProbe::new(&[true]),
            every(3600),
        );
        let (tx, rx) = broadcast::channel(1);

        let handle = tokio::spawn(monitor.run(rx));
        time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();

        time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();
        assert_eq!(supervisor.status().state, LifecycleState::Running);
    }

    #[tokio::test]
    async fn test_socket_probe_against_tcp_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let probe = SocketProbe::new(SidecarEndpoint::Tcp(addr.clone()));
        assert!(probe.probe().await.is_ok());

        drop(listener);
        assert!(probe.probe().await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_socket_probe_missing_unix_socket() {
        let dir = tempfile::tempdir().unwrap();
        let probe = SocketProbe::new(SidecarEndpoint::Unix(dir.path().join("missing.sock")));
        assert!(matches!(probe.probe().await, Err(ProbeError::Connect(_))));
    }
}
