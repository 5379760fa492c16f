//! # insitu-config
//!
//! Configuration management for insitu.
//!
//! Loads configuration from:
//! 1. `$INSITU_CONFIG` if set, otherwise `~/.config/insitu/config.toml` (global)
//! 2. Environment variables (highest priority)

pub mod logging;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Shell used when `SHELL` is unset or empty.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Default size of the file read window (bytes forwarded to the filter per read).
pub const DEFAULT_WINDOW_SIZE: usize = 1024;

/// Default capacity of one overflow block.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub relay: RelayConfig,
    pub shell: ShellConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Config::default(),
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Parse a single config file, without environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading config from {:?}", path);
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Config file path: `$INSITU_CONFIG`, else `~/.config/insitu/config.toml`
    pub fn config_path() -> Option<PathBuf> {
        match std::env::var_os("INSITU_CONFIG") {
            Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
            _ => Self::global_config_path(),
        }
    }

    /// Global config path: ~/.config/insitu/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("insitu/config.toml"))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(size) = lookup("INSITU_WINDOW_SIZE").and_then(|v| v.parse().ok()) {
            self.relay.window_size = size;
        }
        if let Some(size) = lookup("INSITU_BLOCK_SIZE").and_then(|v| v.parse().ok()) {
            self.relay.block_size = size;
        }
        // An empty SHELL means "not set", same as the unset case.
        if let Some(shell) = lookup("SHELL").filter(|s| !s.is_empty()) {
            self.shell.program = Some(PathBuf::from(shell));
        }
    }

    /// Generate default config TOML string
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}

/// Relay buffer sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Bytes read from the file per positioned read
    pub window_size: usize,
    /// Capacity of one overflow block
    pub block_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl RelayConfig {
    /// Window size, never zero.
    pub fn window_size(&self) -> usize {
        self.window_size.max(1)
    }

    /// Block size, never zero.
    pub fn block_size(&self) -> usize {
        self.block_size.max(1)
    }
}

/// Interpreter used to run the filter command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Shell executable; invoked as `<program> -c <command>`
    pub program: Option<PathBuf>,
}

impl ShellConfig {
    /// The configured shell, or `/bin/sh`.
    pub fn program(&self) -> PathBuf {
        self.program
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SHELL))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.relay.window_size, 1024);
        assert_eq!(config.relay.block_size, 4096);
        assert_eq!(config.shell.program(), PathBuf::from("/bin/sh"));
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[relay]"));
        assert!(toml_str.contains("window_size = 1024"));
        assert!(toml_str.contains("block_size = 4096"));
    }

    #[test]
    fn test_shell_override() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[("SHELL", "/bin/bash")]));
        assert_eq!(config.shell.program(), PathBuf::from("/bin/bash"));
    }

    #[test]
    fn test_empty_shell_falls_back() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[("SHELL", "")]));
        assert_eq!(config.shell.program(), PathBuf::from(DEFAULT_SHELL));
    }

    #[test]
    fn test_size_overrides_ignore_garbage() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[
            ("INSITU_WINDOW_SIZE", "512"),
            ("INSITU_BLOCK_SIZE", "lots"),
        ]));
        assert_eq!(config.relay.window_size, 512);
        assert_eq!(config.relay.block_size, DEFAULT_BLOCK_SIZE);
    }

    #[test]
    fn test_zero_sizes_are_clamped() {
        let relay = RelayConfig {
            window_size: 0,
            block_size: 0,
        };
        assert_eq!(relay.window_size(), 1);
        assert_eq!(relay.block_size(), 1);
    }
}
