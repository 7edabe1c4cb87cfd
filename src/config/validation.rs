//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and addresses.
//! All errors are collected rather than stopping at the first one.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::state::layout::validate_agent_id;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("gateway.bind_address {0:?} is not a socket address")]
    InvalidBindAddress(String),
    #[error("gateway.request_timeout_secs must be positive")]
    ZeroRequestTimeout,
    #[error("state.agent_id: {0}")]
    InvalidAgentId(String),
    #[error("sidecar.probe_interval_secs must be positive")]
    ZeroProbeInterval,
    #[error("sidecar.probe_timeout_secs must be positive")]
    ZeroProbeTimeout,
    #[error("supervisor.failure_window_secs must be positive")]
    ZeroFailureWindow,
    #[error("supervisor.failure_threshold must be positive")]
    ZeroFailureThreshold,
    #[error("supervisor.base_backoff_ms must be positive")]
    ZeroBaseBackoff,
    #[error("supervisor.base_backoff_ms ({base_ms}) exceeds max_backoff_ms ({max_ms})")]
    BackoffRange { base_ms: u64, max_ms: u64 },
    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.gateway.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.gateway.bind_address.clone(),
        ));
    }
    if config.gateway.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if let Err(e) = validate_agent_id(&config.state.agent_id) {
        errors.push(ValidationError::InvalidAgentId(e.to_string()));
    }

    if config.sidecar.probe_interval_secs == 0 {
        errors.push(ValidationError::ZeroProbeInterval);
    }
    if config.sidecar.probe_timeout_secs == 0 {
        errors.push(ValidationError::ZeroProbeTimeout);
    }

    let supervisor = &config.supervisor;
    if supervisor.failure_window_secs == 0 {
        errors.push(ValidationError::ZeroFailureWindow);
    }
    if supervisor.failure_threshold == 0 {
        errors.push(ValidationError::ZeroFailureThreshold);
    }
    if supervisor.base_backoff_ms == 0 {
        errors.push(ValidationError::ZeroBaseBackoff);
    } else if supervisor.base_backoff_ms > supervisor.max_backoff_ms {
        errors.push(ValidationError::BackoffRange {
            base_ms: supervisor.base_backoff_ms,
            max_ms: supervisor.max_backoff_ms,
        });
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.gateway.bind_address = ":18789".into();
        config.state.agent_id = "../escape".into();
        config.supervisor.failure_threshold = 0;
        config.supervisor.base_backoff_ms = 60_000;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::InvalidBindAddress(":18789".into())));
        assert!(errors.contains(&ValidationError::ZeroFailureThreshold));
        assert!(errors.contains(&ValidationError::BackoffRange {
            base_ms: 60_000,
            max_ms: 30_000
        }));
        assert!(matches!(errors[1], ValidationError::InvalidAgentId(_)));
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = GatewayConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::InvalidMetricsAddress("nope".into())])
        );
    }
}
