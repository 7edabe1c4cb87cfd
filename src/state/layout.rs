//! Canonical on-disk layout for one agent.
//!
//! ```text
//! <root>/
//!   config/forgemate.json5
//!   agents/<agent_id>/sessions/sessions.json
//!   agents/<agent_id>/memory/memory.sqlite
//!   run/
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("agent ID must not be empty")]
    EmptyAgentId,
    #[error("agent ID {0:?} contains invalid path characters")]
    InvalidAgentId(String),
    #[error("create state dir {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("chmod state dir {}: {source}", .path.display())]
    Permissions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reject agent IDs that could escape the state directory.
pub fn validate_agent_id(agent_id: &str) -> Result<(), LayoutError> {
    if agent_id.is_empty() {
        return Err(LayoutError::EmptyAgentId);
    }
    if agent_id.contains(['/', '\\']) || agent_id.contains("..") || agent_id == "." {
        return Err(LayoutError::InvalidAgentId(agent_id.to_string()));
    }
    Ok(())
}

/// Resolved state paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    pub root_dir: PathBuf,
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub agent_dir: PathBuf,
    pub sessions_dir: PathBuf,
    pub session_store_file: PathBuf,
    pub memory_dir: PathBuf,
    pub memory_db_file: PathBuf,
    pub run_dir: PathBuf,
}

impl StateLayout {
    /// Resolve the layout for `agent_id` under `root`.
    pub fn resolve(root: impl AsRef<Path>, agent_id: &str) -> Result<Self, LayoutError> {
        validate_agent_id(agent_id)?;

        let root_dir = root.as_ref().to_path_buf();
        let config_dir = root_dir.join("config");
        let agent_dir = root_dir.join("agents").join(agent_id);
        let sessions_dir = agent_dir.join("sessions");
        let memory_dir = agent_dir.join("memory");

        Ok(Self {
            config_file: config_dir.join("forgemate.json5"),
            session_store_file: sessions_dir.join("sessions.json"),
            memory_db_file: memory_dir.join("memory.sqlite"),
            run_dir: root_dir.join("run"),
            config_dir,
            agent_dir,
            sessions_dir,
            memory_dir,
            root_dir,
        })
    }

    /// Directories that must exist, parents first.
    pub fn directories(&self) -> [&Path; 6] {
        [
            self.root_dir.as_path(),
            self.config_dir.as_path(),
            self.agent_dir.as_path(),
            self.sessions_dir.as_path(),
            self.memory_dir.as_path(),
            self.run_dir.as_path(),
        ]
    }

    /// Create every directory and restrict it to the owner (0700 on Unix).
    pub fn ensure(&self) -> Result<(), LayoutError> {
        for dir in self.directories() {
            fs::create_dir_all(dir).map_err(|source| LayoutError::Create {
                path: dir.to_path_buf(),
                source,
            })?;
            restrict_permissions(dir).map_err(|source| LayoutError::Permissions {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        tracing::debug!(root = %self.root_dir.display(), "State layout ready");
        Ok(())
    }

    /// Readiness check: the state root exists.
    pub fn is_ready(&self) -> bool {
        self.root_dir.is_dir()
    }
}

#[cfg(unix)]
fn restrict_permissions(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn restrict_permissions(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_deterministic() {
        let layout = StateLayout::resolve("/tmp/forgemate", "main").unwrap();
        assert_eq!(
            layout.session_store_file,
            PathBuf::from("/tmp/forgemate/agents/main/sessions/sessions.json")
        );
        assert_eq!(
            layout.memory_db_file,
            PathBuf::from("/tmp/forgemate/agents/main/memory/memory.sqlite")
        );
        assert_eq!(
            layout.config_file,
            PathBuf::from("/tmp/forgemate/config/forgemate.json5")
        );
        assert_eq!(layout.run_dir, PathBuf::from("/tmp/forgemate/run"));
    }

    #[test]
    fn test_rejects_escaping_agent_ids() {
        for bad in ["", ".", "..", "a/b", "a\\b", "x..y", "../etc"] {
            assert!(validate_agent_id(bad).is_err(), "{bad:?} should be rejected");
            assert!(StateLayout::resolve("/tmp", bad).is_err());
        }
        for good in ["main", "agentA", "ops-1", "a.b"] {
            assert!(validate_agent_id(good).is_ok(), "{good:?} should be accepted");
        }
    }

    #[test]
    fn test_ensure_creates_dirs() {
        let root = tempfile::tempdir().unwrap();
        let layout = StateLayout::resolve(root.path().join(".forgemate"), "agentA").unwrap();
        assert!(!layout.is_ready());

        layout.ensure().unwrap();
        for dir in layout.directories() {
            assert!(dir.is_dir(), "expected {} to exist", dir.display());
        }
        assert!(layout.is_ready());

        // Idempotent.
        layout.ensure().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let layout = StateLayout::resolve(root.path().join("state"), "main").unwrap();
        fs::create_dir_all(&layout.root_dir).unwrap();
        fs::set_permissions(&layout.root_dir, fs::Permissions::from_mode(0o755)).unwrap();

        layout.ensure().unwrap();
        for dir in layout.directories() {
            let mode = fs::metadata(dir).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o700, "{}", dir.display());
        }
    }
}
