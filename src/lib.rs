//! ForgeMate gateway control plane.
//!
//! Hosts the sidecar restart supervisor and exposes its health over HTTP.

pub mod config;
pub mod gateway;
pub mod lifecycle;
pub mod observability;
pub mod reload;
pub mod sidecar;
pub mod state;

pub use config::GatewayConfig;
pub use gateway::GatewayServer;
pub use lifecycle::Shutdown;
pub use sidecar::Supervisor;
