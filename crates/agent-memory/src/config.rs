//! Runtime configuration for agent memory.
//!
//! Sources, lowest to highest precedence: defaults, a TOML file, environment
//! variables (`AGENT_MEMORY_*`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;

use crate::action::{ActionDescriptor, ActionRegistry};
use crate::error::{MemoryError, MemoryResult};

pub const ENV_DIR: &str = "AGENT_MEMORY_DIR";
pub const ENV_RECENT_WINDOW: &str = "AGENT_MEMORY_RECENT_WINDOW";
pub const ENV_LOG_FORMAT: &str = "AGENT_MEMORY_LOG_FORMAT";
pub const ENV_LOG_LEVEL: &str = "AGENT_MEMORY_LOG_LEVEL";
pub const ENV_ACTIONS: &str = "AGENT_MEMORY_ACTIONS";

/// Configuration for a memory session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Directory holding `memory.json`.
    pub storage_dir: PathBuf,
    /// Window used by news detection; 0 compares against the whole log.
    pub recent_window: usize,
    /// Emit JSON log lines.
    pub log_json: bool,
    /// Default log level when `RUST_LOG` is unset.
    pub log_level: String,
    /// Action tags to register in addition to the builtin set.
    pub extra_actions: Vec<String>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        MemoryConfig {
            storage_dir: PathBuf::from(".agent-memory"),
            recent_window: 0,
            log_json: false,
            log_level: "info".to_string(),
            extra_actions: Vec::new(),
        }
    }
}

impl MemoryConfig {
    pub fn from_toml_str(s: &str) -> MemoryResult<Self> {
        toml::from_str(s).map_err(|e| MemoryError::Config(e.to_string()))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> MemoryResult<Self> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| MemoryError::codec_io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Defaults overridden by environment variables.
    pub fn from_env() -> MemoryResult<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply `AGENT_MEMORY_*` overrides on top of `self`.
    pub fn with_env_overrides(self) -> MemoryResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> MemoryResult<Self> {
        if let Some(dir) = lookup(ENV_DIR) {
            self.storage_dir = PathBuf::from(dir);
        }
        if let Some(window) = lookup(ENV_RECENT_WINDOW) {
            self.recent_window = window.trim().parse().map_err(|_| {
                MemoryError::Config(format!("{ENV_RECENT_WINDOW} must be an integer: {window}"))
            })?;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            self.log_json = format.eq_ignore_ascii_case("json");
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(actions) = lookup(ENV_ACTIONS) {
            self.extra_actions.extend(
                actions
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from),
            );
        }
        Ok(self)
    }

    /// Parsed log level, falling back to INFO.
    pub fn level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }

    /// Builtin actions plus `extra_actions`.
    pub fn build_registry(&self) -> MemoryResult<ActionRegistry> {
        let mut registry = ActionRegistry::with_builtin_actions()?;
        for tag in &self.extra_actions {
            if registry.contains(&tag.as_str().into()) {
                continue;
            }
            registry.register(tag.as_str(), ActionDescriptor::external(tag.as_str()))?;
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let c = MemoryConfig::default();
        assert_eq!(c.recent_window, 0);
        assert_eq!(c.level(), Level::INFO);
        assert_eq!(c.storage_dir, PathBuf::from(".agent-memory"));
    }

    #[test]
    fn test_toml_partial() {
        let c = MemoryConfig::from_toml_str(
            r#"
            storage_dir = "/var/lib/team"
            extra_actions = ["Vote"]
            "#,
        )
        .unwrap();
        assert_eq!(c.storage_dir, PathBuf::from("/var/lib/team"));
        assert_eq!(c.extra_actions, vec!["Vote".to_string()]);
        assert!(!c.log_json);
    }

    #[test]
    fn test_toml_invalid() {
        let err = MemoryConfig::from_toml_str("recent_window = \"lots\"").unwrap_err();
        assert!(matches!(err, MemoryError::Config(_)));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_DIR, "/tmp/mem"),
            (ENV_RECENT_WINDOW, "5"),
            (ENV_LOG_FORMAT, "JSON"),
            (ENV_LOG_LEVEL, "debug"),
            (ENV_ACTIONS, "Vote, Nominate,,"),
        ]);
        let c = MemoryConfig::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(c.storage_dir, PathBuf::from("/tmp/mem"));
        assert_eq!(c.recent_window, 5);
        assert!(c.log_json);
        assert_eq!(c.level(), Level::DEBUG);
        assert_eq!(c.extra_actions, vec!["Vote", "Nominate"]);
    }

    #[test]
    fn test_bad_window_override() {
        let err = MemoryConfig::default()
            .with_overrides(|k| (k == ENV_RECENT_WINDOW).then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, MemoryError::Config(_)));
    }

    #[test]
    fn test_build_registry_with_extras() {
        let c = MemoryConfig {
            extra_actions: vec!["Vote".into(), "WriteCode".into()],
            ..Default::default()
        };
        let reg = c.build_registry().unwrap();
        assert!(reg.contains(&"Vote".into()));
        // builtin binding wins over an extra of the same name
        let d = reg.resolve(&"WriteCode".into()).unwrap();
        assert!(!d.type_name.starts_with("external::"));
    }
}
