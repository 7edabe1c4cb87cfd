//! File-backed agent state.

pub mod layout;

pub use layout::{validate_agent_id, LayoutError, StateLayout};
