//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse, FORGEMATE_* env overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads + validates
//!     → reload::policy classifies changed keys (hot-apply | restart)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults; running without a file is supported
//! - Environment overrides win over the file
//! - Validation reports every error at once

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_config_file, ConfigError};
pub use schema::{
    GatewayConfig, ListenerConfig, LogFormat, ObservabilityConfig, SidecarConfig, StateConfig,
    SupervisorConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
