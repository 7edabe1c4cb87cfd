//! Configuration loading from disk and environment.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

pub const ENV_HTTP_ADDR: &str = "FORGEMATE_HTTP_ADDR";
pub const ENV_STATE_DIR: &str = "FORGEMATE_STATE_DIR";
pub const ENV_AGENT_ID: &str = "FORGEMATE_AGENT_ID";
pub const ENV_SIDECAR_SOCKET: &str = "FORGEMATE_SIDECAR_SOCKET";
pub const ENV_SIDECAR_ENABLED: &str = "FORGEMATE_SIDECAR_ENABLED";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, then apply `FORGEMATE_*`
/// environment overrides and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => GatewayConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate a TOML file without environment overrides.
pub fn load_config_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let config = read_config_file(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Override fields from environment variables; empty values are ignored.
///
/// When the state dir is overridden and no socket was configured, the socket
/// keeps following the new state dir.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(addr) = get(ENV_HTTP_ADDR) {
        config.gateway.bind_address = addr;
    }
    if let Some(dir) = get(ENV_STATE_DIR) {
        config.state.dir = PathBuf::from(dir);
    }
    if let Some(agent_id) = get(ENV_AGENT_ID) {
        config.state.agent_id = agent_id;
    }
    if let Some(socket) = get(ENV_SIDECAR_SOCKET) {
        config.sidecar.socket = Some(socket);
    }
    if let Some(enabled) = get(ENV_SIDECAR_ENABLED) {
        config.sidecar.enabled = enabled == "1";
    }
}
