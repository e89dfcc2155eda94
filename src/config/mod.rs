//! Crate configuration, loaded from `config.toml`.
//!
//! Resolution order for the workspace directory: `SOVETID_WORKSPACE` env →
//! `~/.sovetid`. A missing config file yields the defaults.

use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration, loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Workspace directory - computed, not serialized.
    #[serde(skip)]
    pub workspace_dir: PathBuf,
    /// Path to config.toml - computed, not serialized.
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Session store backend configuration (`[store]`).
    #[serde(default)]
    pub store: StoreConfig,

    /// Validation policy configuration (`[validation]`).
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Session store configuration (`[store]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend name: `"json"` (default) or `"memory"`.
    #[serde(default = "default_store_backend")]
    pub backend: String,
    /// Override for the JSON session file path. Default:
    /// `<workspace>/sessions.json`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_store_backend() -> String {
    "json".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
        }
    }
}

impl StoreConfig {
    /// Effective path of the JSON session file for a given workspace.
    pub fn session_file_path(&self, workspace_dir: &Path) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| workspace_dir.join("sessions.json"))
    }
}

/// Validation policy configuration (`[validation]` section).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// When `true`, manual entries may carry future-dated start/end
    /// timestamps. Default `false`: backfill is rejected unless both
    /// timestamps are at or before "now".
    #[serde(default)]
    pub allow_future_sessions: bool,
}

impl Config {
    /// Resolve the workspace directory: `SOVETID_WORKSPACE` env, else
    /// `~/.sovetid`.
    pub fn resolve_workspace_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("SOVETID_WORKSPACE") {
            let trimmed = dir.trim();
            if !trimmed.is_empty() {
                return Ok(PathBuf::from(trimmed));
            }
        }
        let user_dirs = UserDirs::new().context("could not determine home directory")?;
        Ok(user_dirs.home_dir().join(".sovetid"))
    }

    /// Load configuration from the default workspace.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::resolve_workspace_dir()?)
    }

    /// Load configuration from `config.toml` under `workspace_dir`,
    /// falling back to defaults when the file does not exist.
    pub fn load_from(workspace_dir: &Path) -> Result<Self> {
        let config_path = workspace_dir.join("config.toml");
        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(content) => toml::from_str(&content)
                .with_context(|| format!("failed to parse {}", config_path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read {}", config_path.display()));
            }
        };
        config.workspace_dir = workspace_dir.to_path_buf();
        config.config_path = config_path;
        Ok(config)
    }

    /// Write the configuration back to its `config.toml`, creating the
    /// workspace directory if needed.
    pub fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.workspace_dir)
            .with_context(|| format!("failed to create {}", self.workspace_dir.display()))?;
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(&self.config_path, content)
            .with_context(|| format!("failed to write {}", self.config_path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_strict_json() {
        let config = Config::default();
        assert_eq!(config.store.backend, "json");
        assert!(!config.validation.allow_future_sessions);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load_from(tmp.path()).unwrap();
        assert_eq!(config.store.backend, "json");
        assert_eq!(config.workspace_dir, tmp.path());
    }

    #[test]
    fn save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::load_from(tmp.path()).unwrap();
        config.store.backend = "memory".into();
        config.validation.allow_future_sessions = true;
        config.save().unwrap();

        let reloaded = Config::load_from(tmp.path()).unwrap();
        assert_eq!(reloaded.store.backend, "memory");
        assert!(reloaded.validation.allow_future_sessions);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("config.toml"),
            "[validation]\nallow_future_sessions = true\n",
        )
        .unwrap();

        let config = Config::load_from(tmp.path()).unwrap();
        assert!(config.validation.allow_future_sessions);
        assert_eq!(config.store.backend, "json");
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("config.toml"), "store = [not toml").unwrap();
        assert!(Config::load_from(tmp.path()).is_err());
    }

    #[test]
    fn session_file_path_honors_override() {
        let store = StoreConfig {
            backend: "json".into(),
            path: Some(PathBuf::from("/tmp/elsewhere.json")),
        };
        assert_eq!(
            store.session_file_path(Path::new("/home/x/.sovetid")),
            PathBuf::from("/tmp/elsewhere.json")
        );

        let default = StoreConfig::default();
        assert_eq!(
            default.session_file_path(Path::new("/home/x/.sovetid")),
            PathBuf::from("/home/x/.sovetid/sessions.json")
        );
    }
}
