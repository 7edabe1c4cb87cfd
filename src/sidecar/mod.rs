//! Sidecar supervision subsystem.
//!
//! # Data Flow
//! ```text
//! monitor.rs (periodic probe of the sidecar socket)
//!     → probe ok:     Supervisor::mark_healthy
//!     → probe failed: breaker cooling down? → not recorded, wait interval
//!                     else Supervisor::mark_failed(now)
//!                     → can_restart(now)? → wait next_backoff()
//!
//! config reload
//!     → Supervisor::set_policy, ProbeSchedule swap
//!
//! gateway /health
//!     → Supervisor::status()
//! ```
//!
//! # Design Decisions
//! - One supervisor per sidecar, owned by whoever constructs it (no globals)
//! - Time is passed in, never read inside the supervisor
//! - Checking restart eligibility never mutates breaker state

pub mod backoff;
pub mod monitor;
pub mod supervisor;

pub use monitor::{
    Probe, ProbeError, ProbeOutcome, ProbeSchedule, SharedSchedule, SidecarEndpoint, SidecarMonitor,
    SocketProbe,
};
pub use supervisor::{LifecycleState, Supervisor, SupervisorPolicy, SupervisorStatus};
