//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Ensure state layout → Supervisor → Sidecar monitor → Watcher + Reloader → Listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → server drains, monitor and reload loop exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{run_gateway, run_gateway_on, RunOptions, StartupError};
