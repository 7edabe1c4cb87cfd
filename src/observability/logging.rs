//! Structured logging setup.
//!
//! `RUST_LOG` wins over the configured level, both at startup and on
//! reload.

use thiserror::Error;
use tracing_subscriber::filter::{LevelFilter, ParseError};
use tracing_subscriber::{fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::{LogFormat, ObservabilityConfig};

#[derive(Debug, Error)]
pub enum LogLevelError {
    #[error("invalid log level directive: {0}")]
    Directive(#[from] ParseError),
    #[error("failed to swap log filter: {0}")]
    Reload(#[from] reload::Error),
}

/// Directive used when `RUST_LOG` is unset.
pub fn default_directive(level: &str) -> String {
    format!("forgemate_gateway={level},forgemate_cli={level},tower_http={level}")
}

/// Changes the level of the installed subscriber.
#[derive(Clone)]
pub struct LogLevelHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    pinned_by_env: bool,
}

impl LogLevelHandle {
    /// Swap the filter to `level`. A no-op when `RUST_LOG` is set.
    pub fn set_level(&self, level: &str) -> Result<(), LogLevelError> {
        if self.pinned_by_env {
            tracing::debug!(level, "RUST_LOG is set, ignoring configured log level");
            return Ok(());
        }
        let filter = EnvFilter::try_new(default_directive(level))?;
        self.handle.reload(filter)?;
        tracing::info!(level, "Log level updated");
        Ok(())
    }

    /// Most verbose level the current filter enables.
    pub fn max_level(&self) -> Option<LevelFilter> {
        self.handle
            .with_current(|filter| filter.max_level_hint())
            .ok()
            .flatten()
    }
}

/// Install the global subscriber. Fails if one is already set.
pub fn init_logging(
    config: &ObservabilityConfig,
) -> Result<LogLevelHandle, tracing_subscriber::util::TryInitError> {
    let from_env = EnvFilter::try_from_default_env().ok();
    let pinned_by_env = from_env.is_some();
    let filter = from_env.unwrap_or_else(|| EnvFilter::new(default_directive(&config.log_level)));

    let (filter, handle) = reload::Layer::new(filter);
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init()?,
        LogFormat::Pretty => registry.with(fmt::layer()).try_init()?,
    }
    Ok(LogLevelHandle {
        handle,
        pinned_by_env,
    })
}
