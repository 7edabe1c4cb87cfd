//! Classify config changes into hot-apply or restart.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::config::GatewayConfig;

/// Keys whose change requires a gateway restart.
///
/// Everything read only at startup belongs here: the listener and its
/// middleware, the state layout, the sidecar wiring, the log format and the
/// metrics exporter. `gateway.auth`, `gateway.port` and
/// `channels.telegram.mode` are reserved for sections `GatewayConfig` does
/// not model yet, so `changed_keys` never yields them.
pub const RESTART_KEYS: &[&str] = &[
    "gateway.auth",
    "gateway.port",
    "gateway.bind_address",
    "gateway.request_timeout_secs",
    "state.dir",
    "state.agent_id",
    "sidecar.enabled",
    "sidecar.socket",
    "observability.log_format",
    "observability.metrics_enabled",
    "observability.metrics_address",
    "channels.telegram.mode",
];

/// How a set of changed config keys should be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReloadAction {
    HotApply,
    Restart,
}

impl fmt::Display for ReloadAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReloadAction::HotApply => f.write_str("hot-apply"),
            ReloadAction::Restart => f.write_str("restart"),
        }
    }
}

/// Any restart-critical key forces a restart; everything else hot-applies.
pub fn decide_action<S: AsRef<str>>(changed_keys: &[S]) -> ReloadAction {
    if changed_keys
        .iter()
        .any(|key| RESTART_KEYS.contains(&key.as_ref()))
    {
        ReloadAction::Restart
    } else {
        ReloadAction::HotApply
    }
}

/// Dotted paths of the leaf values that differ between two configs.
pub fn changed_keys(old: &GatewayConfig, new: &GatewayConfig) -> Vec<String> {
    let (old, new) = match (serde_json::to_value(old), serde_json::to_value(new)) {
        (Ok(old), Ok(new)) => (old, new),
        _ => return Vec::new(),
    };
    let mut keys = Vec::new();
    diff_values("", &old, &new, &mut keys);
    keys.sort();
    keys
}

fn diff_values(prefix: &str, old: &Value, new: &Value, out: &mut Vec<String>) {
    match (old, new) {
        (Value::Object(a), Value::Object(b)) => {
            for key in a.keys().chain(b.keys().filter(|k| !a.contains_key(*k))) {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                diff_values(
                    &path,
                    a.get(key).unwrap_or(&Value::Null),
                    b.get(key).unwrap_or(&Value::Null),
                    out,
                );
            }
        }
        (a, b) if a != b => out.push(prefix.to_string()),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hot_apply_by_default() {
        let action = decide_action(&["providers.openai.apiKey", "memory.embeddingModel"]);
        assert_eq!(action, ReloadAction::HotApply);
    }

    #[test]
    fn test_restart_for_critical_keys() {
        let action = decide_action(&["memory.embeddingModel", "sidecar.socket"]);
        assert_eq!(action, ReloadAction::Restart);
    }

    #[test]
    fn test_empty_keys_hot_apply() {
        let none: [&str; 0] = [];
        assert_eq!(decide_action(&none), ReloadAction::HotApply);
    }

    #[test]
    fn test_changed_keys_lists_leaves() {
        let old = GatewayConfig::default();
        let mut new = old.clone();
        new.supervisor.failure_threshold = 7;
        new.sidecar.socket = Some("unix:/tmp/x.sock".into());
        new.observability.log_level = "debug".into();

        let keys = changed_keys(&old, &new);
        assert_eq!(
            keys,
            vec![
                "observability.log_level",
                "sidecar.socket",
                "supervisor.failure_threshold",
            ]
        );
        assert_eq!(decide_action(&keys), ReloadAction::Restart);
    }

    #[test]
    fn test_runtime_settings_hot_apply() {
        let old = GatewayConfig::default();
        let mut new = old.clone();
        new.supervisor.failure_window_secs = 60;
        new.supervisor.breaker_cooldown_secs = Some(30);
        new.sidecar.probe_interval_secs = 10;
        new.sidecar.probe_timeout_secs = 4;
        new.observability.log_level = "warn".into();

        let keys = changed_keys(&old, &new);
        assert_eq!(keys.len(), 5);
        assert_eq!(decide_action(&keys), ReloadAction::HotApply);
    }

    #[test]
    fn test_startup_only_settings_restart() {
        let old = GatewayConfig::default();
        let edits: [fn(&mut GatewayConfig); 5] = [
            |c| c.gateway.request_timeout_secs = 5,
            |c| c.sidecar.enabled = false,
            |c| c.observability.log_format = crate::config::LogFormat::Json,
            |c| c.observability.metrics_enabled = true,
            |c| c.observability.metrics_address = "127.0.0.1:9999".into(),
        ];
        for edit in edits {
            let mut new = old.clone();
            edit(&mut new);
            let keys = changed_keys(&old, &new);
            assert_eq!(decide_action(&keys), ReloadAction::Restart, "keys {keys:?}");
        }
    }

    #[test]
    fn test_identical_configs_have_no_changes() {
        let config = GatewayConfig::default();
        assert!(changed_keys(&config, &config.clone()).is_empty());
    }

    #[test]
    fn test_action_serializes_kebab_case() {
        assert_eq!(serde_json::to_value(ReloadAction::HotApply).unwrap(), "hot-apply");
        assert_eq!(ReloadAction::Restart.to_string(), "restart");
    }
}
