//! Sidecar restart supervisor.
//!
//! Pure bookkeeping: the supervisor never spawns or probes anything. A
//! restart-control loop reports outcomes through [`Supervisor::mark_failed`]
//! and [`Supervisor::mark_healthy`] and asks [`Supervisor::can_restart`] and
//! [`Supervisor::next_backoff`] before restarting. Time is always supplied
//! by the caller.
//!
//! # State Transitions
//! ```text
//! Starting → Running:        first mark_healthy
//! Running → Degraded:        mark_failed below threshold
//! Degraded → Running:        mark_healthy
//! Degraded → BreakerOpen:    failure count reaches threshold within window
//! BreakerOpen → Running:     mark_healthy
//! BreakerOpen → Degraded:    mark_failed after the window (history reset)
//! ```

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::config::SupervisorConfig;
use crate::sidecar::backoff::calculate_backoff;

/// Coarse health label of the supervised sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleState {
    Starting,
    Running,
    Degraded,
    BreakerOpen,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Degraded => "degraded",
            LifecycleState::BreakerOpen => "breaker-open",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Restart policy of one supervisor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorPolicy {
    /// Failures older than this are forgotten.
    pub failure_window: Duration,
    /// How long an open breaker blocks restarts.
    pub breaker_cooldown: Duration,
    /// Failures within the window that trip the breaker.
    pub failure_threshold: u32,
    /// Backoff after the first failure.
    pub base_backoff: Duration,
    /// Backoff ceiling.
    pub max_backoff: Duration,
}

impl Default for SupervisorPolicy {
    fn default() -> Self {
        let window = Duration::from_secs(10 * 60);
        Self {
            failure_window: window,
            breaker_cooldown: window,
            failure_threshold: 5,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl From<&SupervisorConfig> for SupervisorPolicy {
    fn from(config: &SupervisorConfig) -> Self {
        let failure_window = Duration::from_secs(config.failure_window_secs);
        Self {
            failure_window,
            breaker_cooldown: config
                .breaker_cooldown_secs
                .map(Duration::from_secs)
                .unwrap_or(failure_window),
            failure_threshold: config.failure_threshold.max(1),
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

/// Point-in-time view of a supervisor, serialized into `/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorStatus {
    pub state: LifecycleState,
    pub failure_count: u32,
    pub breaker_open: bool,
    #[serde(rename = "breakerOpened", skip_serializing_if = "Option::is_none")]
    pub breaker_opened_at: Option<DateTime<Utc>>,
    #[serde(rename = "lastFailure", skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<DateTime<Utc>>,
    #[serde(rename = "restartBackoff", serialize_with = "serialize_duration")]
    pub current_backoff: Duration,
}

fn serialize_duration<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("{value:?}"))
}

#[derive(Debug)]
struct Inner {
    state: LifecycleState,
    failure_count: u32,
    last_failure_at: Option<DateTime<Utc>>,
    breaker_open: bool,
    breaker_opened_at: Option<DateTime<Utc>>,
}

/// Tracks failures of one sidecar and gates its restarts.
///
/// Writers (`mark_*`) are mutually exclusive; readers share a read lock.
/// The policy can be swapped while running; each operation reads it once.
#[derive(Debug)]
pub struct Supervisor {
    policy: ArcSwap<SupervisorPolicy>,
    inner: RwLock<Inner>,
}

impl Supervisor {
    /// Create a supervisor in the `starting` state.
    pub fn new(policy: SupervisorPolicy) -> Self {
        Self {
            policy: ArcSwap::from_pointee(policy),
            inner: RwLock::new(Inner {
                state: LifecycleState::Starting,
                failure_count: 0,
                last_failure_at: None,
                breaker_open: false,
                breaker_opened_at: None,
            }),
        }
    }

    pub fn policy(&self) -> SupervisorPolicy {
        **self.policy.load()
    }

    /// Replace the policy. Failure history is kept and judged by the new
    /// policy from the next operation on.
    pub fn set_policy(&self, policy: SupervisorPolicy) {
        tracing::info!(?policy, "Supervisor policy updated");
        self.policy.store(Arc::new(policy));
    }

    /// Record a successful startup and clear all failure history.
    pub fn mark_healthy(&self) {
        let mut inner = self.write();
        if inner.state != LifecycleState::Running {
            tracing::info!(
                previous = %inner.state,
                failure_count = inner.failure_count,
                "Sidecar healthy"
            );
        }
        inner.state = LifecycleState::Running;
        inner.failure_count = 0;
        inner.last_failure_at = None;
        inner.breaker_open = false;
        inner.breaker_opened_at = None;
    }

    /// Record a sidecar failure observed at `now`.
    ///
    /// `now` should not go backwards between calls; out-of-order values are
    /// accepted and simply never count as stale.
    pub fn mark_failed(&self, now: DateTime<Utc>) {
        let policy = self.policy();
        let mut inner = self.write();

        if let Some(last) = inner.last_failure_at {
            if elapsed_exceeds(now, last, policy.failure_window) {
                tracing::debug!(
                    stale_failures = inner.failure_count,
                    "Failure history outside window, resetting"
                );
                inner.failure_count = 0;
                inner.breaker_open = false;
                inner.breaker_opened_at = None;
            }
        }

        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_at = Some(now);
        inner.state = LifecycleState::Degraded;

        if inner.failure_count >= policy.failure_threshold {
            if !inner.breaker_open {
                tracing::warn!(
                    failure_count = inner.failure_count,
                    threshold = policy.failure_threshold,
                    cooldown = ?policy.breaker_cooldown,
                    "Restart breaker opened"
                );
            }
            inner.breaker_open = true;
            inner.breaker_opened_at = Some(now);
            inner.state = LifecycleState::BreakerOpen;
        }
    }

    /// Whether a restart may be attempted at `now`.
    ///
    /// Does not close the breaker once the cooldown has elapsed; only a later
    /// `mark_healthy` or a stale `mark_failed` does.
    pub fn can_restart(&self, now: DateTime<Utc>) -> bool {
        let cooldown = self.policy().breaker_cooldown;
        let inner = self.read();
        if !inner.breaker_open {
            return true;
        }
        match inner.breaker_opened_at {
            Some(opened) => elapsed_exceeds(now, opened, cooldown),
            None => true,
        }
    }

    /// Delay to wait before the next restart attempt.
    pub fn next_backoff(&self) -> Duration {
        let inner = self.read();
        self.backoff_for(inner.failure_count)
    }

    /// Consistent snapshot for health reporting.
    pub fn status(&self) -> SupervisorStatus {
        let inner = self.read();
        SupervisorStatus {
            state: inner.state,
            failure_count: inner.failure_count,
            breaker_open: inner.breaker_open,
            breaker_opened_at: inner.breaker_opened_at,
            last_failure_at: inner.last_failure_at,
            current_backoff: self.backoff_for(inner.failure_count),
        }
    }

    fn backoff_for(&self, failure_count: u32) -> Duration {
        let policy = self.policy();
        calculate_backoff(failure_count, policy.base_backoff, policy.max_backoff)
    }

    // Every write section is panic-free, so a poisoned lock still guards a
    // consistent state.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(SupervisorPolicy::default())
    }
}

/// `now - since > limit`; a negative elapsed time never exceeds.
fn elapsed_exceeds(now: DateTime<Utc>, since: DateTime<Utc>, limit: Duration) -> bool {
    match now.signed_duration_since(since).to_std() {
        Ok(elapsed) => elapsed > limit,
        Err(_) => false,
    }
}
