//! Gateway HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, trace + timeout layers)
//!     → /health  → sidecar::Supervisor::status
//!     → /ready   → readiness predicate (state layout present)
//!     → /v1/connect/validate → protocol.rs
//! ```

pub mod protocol;
pub mod server;

pub use protocol::{decode_frame, validate_connect_first, ConnectParams, Frame, ProtocolError};
pub use server::{AppState, GatewayServer, ReadinessCheck};
