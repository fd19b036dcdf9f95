//! Configuration module for Fleetcall
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - User configuration (~/.fleetcall.toml)
//! - Project configuration (./fleetcall.toml)
//! - An explicit file (`--config` or `FLEETCALL_CONFIG`)
//! - Environment variables

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::engine::ConnectionOptions;
use crate::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default settings
    pub defaults: Defaults,

    /// Privilege escalation settings
    pub privilege_escalation: PrivilegeEscalation,

    /// Engine settings
    pub engine: EngineConfig,
}

/// Default configuration values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Default inventory source
    pub inventory: Option<String>,

    /// Default remote user
    pub remote_user: String,

    /// Private key used for connections
    pub private_key_file: Option<PathBuf>,

    /// Number of parallel processes
    pub forks: usize,

    /// Connection timeout in seconds
    pub timeout: u64,

    /// Module used when none is given
    pub module_name: String,

    /// Host pattern used when none is given
    pub pattern: String,

    /// Connection plugin
    pub transport: String,

    /// Gather facts before the ad-hoc task; unset means no
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gather_facts: Option<bool>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            inventory: None,
            remote_user: "root".to_string(),
            private_key_file: None,
            forks: 5,
            timeout: 10,
            module_name: "ping".to_string(),
            pattern: "all".to_string(),
            transport: "smart".to_string(),
            gather_facts: None,
        }
    }
}

/// Privilege escalation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivilegeEscalation {
    /// Enable become by default; unset means no
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#become: Option<bool>,

    /// Default become method
    pub become_method: String,

    /// Default become user
    pub become_user: String,
}

impl Default for PrivilegeEscalation {
    fn default() -> Self {
        Self {
            r#become: None,
            become_method: "sudo".to_string(),
            become_user: "root".to_string(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path to `ansible-playbook`; looked up on `PATH` when unset
    pub ansible_playbook: Option<PathBuf>,

    /// Extra module search path
    pub module_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Files are applied in search order, later ones winning.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Config::default();

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                debug!(path = %path.display(), "loading configuration file");
                config = config.merge_from_file(&path)?;
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Get the list of configuration file paths to check
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        // Explicit path takes priority
        if let Some(path) = explicit_path {
            return vec![path.clone()];
        }
        if let Ok(env_config) = std::env::var("FLEETCALL_CONFIG") {
            return vec![PathBuf::from(env_config)];
        }

        let mut paths = Vec::new();
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".fleetcall.toml"));
        }
        paths.push(PathBuf::from("fleetcall.toml"));
        paths
    }

    /// Merge configuration from a file
    fn merge_from_file(&self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let parse_error = |e: String| Error::Config(format!("{}: {}", path.display(), e));

        let file_config: Config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
            "json" => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
            _ => toml::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
        };

        Ok(self.merge(file_config))
    }

    /// Merge another config into this one.
    ///
    /// Values `other` sets explicitly (non-default strings and numbers, any
    /// `Some`) win; everything else is kept from `self`.
    fn merge(&self, other: Config) -> Config {
        let base = Defaults::default();
        let base_become = PrivilegeEscalation::default();
        let pick = |theirs: &str, ours: &str, default: &str| {
            if theirs != default {
                theirs.to_string()
            } else {
                ours.to_string()
            }
        };

        Config {
            defaults: Defaults {
                inventory: other
                    .defaults
                    .inventory
                    .or_else(|| self.defaults.inventory.clone()),
                remote_user: pick(
                    &other.defaults.remote_user,
                    &self.defaults.remote_user,
                    &base.remote_user,
                ),
                private_key_file: other
                    .defaults
                    .private_key_file
                    .or_else(|| self.defaults.private_key_file.clone()),
                forks: if other.defaults.forks != base.forks {
                    other.defaults.forks
                } else {
                    self.defaults.forks
                },
                timeout: if other.defaults.timeout != base.timeout {
                    other.defaults.timeout
                } else {
                    self.defaults.timeout
                },
                module_name: pick(
                    &other.defaults.module_name,
                    &self.defaults.module_name,
                    &base.module_name,
                ),
                pattern: pick(
                    &other.defaults.pattern,
                    &self.defaults.pattern,
                    &base.pattern,
                ),
                transport: pick(
                    &other.defaults.transport,
                    &self.defaults.transport,
                    &base.transport,
                ),
                gather_facts: other.defaults.gather_facts.or(self.defaults.gather_facts),
            },
            privilege_escalation: PrivilegeEscalation {
                r#become: other
                    .privilege_escalation
                    .r#become
                    .or(self.privilege_escalation.r#become),
                become_method: pick(
                    &other.privilege_escalation.become_method,
                    &self.privilege_escalation.become_method,
                    &base_become.become_method,
                ),
                become_user: pick(
                    &other.privilege_escalation.become_user,
                    &self.privilege_escalation.become_user,
                    &base_become.become_user,
                ),
            },
            engine: EngineConfig {
                ansible_playbook: other
                    .engine
                    .ansible_playbook
                    .or_else(|| self.engine.ansible_playbook.clone()),
                module_path: other
                    .engine
                    .module_path
                    .or_else(|| self.engine.module_path.clone()),
            },
        }
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        // FLEETCALL_FORKS
        if let Ok(forks) = std::env::var("FLEETCALL_FORKS") {
            if let Ok(n) = forks.parse() {
                self.defaults.forks = n;
            }
        }

        // FLEETCALL_TIMEOUT
        if let Ok(timeout) = std::env::var("FLEETCALL_TIMEOUT") {
            if let Ok(n) = timeout.parse() {
                self.defaults.timeout = n;
            }
        }

        // FLEETCALL_REMOTE_USER
        if let Ok(user) = std::env::var("FLEETCALL_REMOTE_USER") {
            self.defaults.remote_user = user;
        }

        // FLEETCALL_BECOME
        if std::env::var("FLEETCALL_BECOME").is_ok() {
            self.privilege_escalation.r#become = Some(true);
        }

        // FLEETCALL_BECOME_USER
        if let Ok(user) = std::env::var("FLEETCALL_BECOME_USER") {
            self.privilege_escalation.become_user = user;
        }

        // FLEETCALL_PRIVATE_KEY_FILE
        if let Ok(file) = std::env::var("FLEETCALL_PRIVATE_KEY_FILE") {
            self.defaults.private_key_file = Some(PathBuf::from(file));
        }

        // FLEETCALL_ANSIBLE_PLAYBOOK
        if let Ok(path) = std::env::var("FLEETCALL_ANSIBLE_PLAYBOOK") {
            self.engine.ansible_playbook = Some(PathBuf::from(path));
        }
    }

    /// Connection options seeded from this configuration
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            remote_user: self.defaults.remote_user.clone(),
            private_key_file: self.defaults.private_key_file.clone(),
            connection: self.defaults.transport.clone(),
            timeout: self.defaults.timeout,
            forks: self.defaults.forks,
            become_: self.privilege_escalation.r#become.unwrap_or(false),
            become_method: self.privilege_escalation.become_method.clone(),
            become_user: self.privilege_escalation.become_user.clone(),
            module_path: self.engine.module_path.clone(),
            ..ConnectionOptions::default()
        }
    }

    /// Load from a specific file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Config::default().merge_from_file(path.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.defaults.forks, 5);
        assert_eq!(config.defaults.timeout, 10);
        assert_eq!(config.defaults.transport, "smart");
        assert_eq!(config.defaults.module_name, "ping");
        assert_eq!(config.privilege_escalation.r#become, None);
    }

    #[test]
    fn test_config_merge() {
        let base = Config {
            defaults: Defaults {
                remote_user: "deploy".to_string(),
                ..Defaults::default()
            },
            ..Config::default()
        };
        let other = Config {
            defaults: Defaults {
                forks: 10,
                ..Defaults::default()
            },
            ..Config::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.defaults.forks, 10);
        assert_eq!(merged.defaults.remote_user, "deploy");
    }

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_later_file_keeps_earlier_become() {
        let dir = tempfile::TempDir::new().unwrap();
        let user = write(
            &dir,
            "user.toml",
            "[privilege_escalation]\nbecome = true\nbecome_user = \"admin\"\n",
        );
        let project = write(&dir, "project.toml", "[defaults]\nforks = 20\n");

        let config = Config::default()
            .merge_from_file(&user)
            .and_then(|c| c.merge_from_file(&project))
            .unwrap();

        assert_eq!(config.defaults.forks, 20);
        assert_eq!(config.privilege_escalation.r#become, Some(true));
        assert_eq!(config.privilege_escalation.become_user, "admin");
        assert_eq!(config.privilege_escalation.become_method, "sudo");
    }

    #[test]
    fn test_later_file_can_switch_flags_off() {
        let dir = tempfile::TempDir::new().unwrap();
        let user = write(
            &dir,
            "user.toml",
            "[defaults]\ngather_facts = true\n\n[privilege_escalation]\nbecome = true\n",
        );
        let project = write(
            &dir,
            "project.toml",
            "[defaults]\ngather_facts = false\n\n[privilege_escalation]\nbecome = false\n",
        );

        let config = Config::default()
            .merge_from_file(&user)
            .and_then(|c| c.merge_from_file(&project))
            .unwrap();

        assert_eq!(config.defaults.gather_facts, Some(false));
        assert_eq!(config.privilege_escalation.r#become, Some(false));
        assert!(!config.connection_options().become_);
    }

    #[test]
    fn test_connection_options() {
        let mut config = Config::default();
        config.defaults.remote_user = "admin".to_string();
        config.privilege_escalation.r#become = Some(true);
        config.engine.module_path = Some(PathBuf::from("/opt/modules"));

        let options = config.connection_options();
        assert_eq!(options.remote_user, "admin");
        assert!(options.become_);
        assert_eq!(options.connection, "smart");
        assert_eq!(options.module_path, Some(PathBuf::from("/opt/modules")));
        assert!(options.conn_pass.is_none());
    }
}
