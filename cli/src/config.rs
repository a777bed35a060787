// Configuration management for the dvroute CLI
//
// Persisted defaults for `dvroute run`, stored as JSON in:
// - macOS: ~/Library/Application Support/dvroute/config.json
// - Linux: ~/.config/dvroute/config.json
// - Windows: %APPDATA%\dvroute\config.json

use anyhow::{Context, Result};
use dvroute_core::RouterConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Routing defaults applied to every node started by `run`
    pub router: RouterConfig,
}

impl Config {
    fn default_dir() -> Result<PathBuf> {
        Ok(dirs::config_dir()
            .context("Failed to determine config directory")?
            .join("dvroute"))
    }

    /// Get the config directory path (cross-platform), creating it if needed
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = Self::default_dir()?;
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        Ok(config_dir)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from the default location, or create it if missing
    pub fn load() -> Result<Self> {
        let config_file = Self::config_file()?;

        if config_file.exists() {
            Self::load_from(&config_file)
        } else {
            let config = Config::default();
            config.save_to(&config_file)?;
            Ok(config)
        }
    }

    /// Load config from the default location without touching the disk
    ///
    /// Falls back to defaults when nothing has been saved yet.
    pub fn load_existing() -> Result<Self> {
        Self::load_from_or_default(&Self::default_dir()?.join("config.json"))
    }

    pub fn load_from_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load config from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config
            .router
            .validate()
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Set a config value (in memory; call `save` to persist)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut router = self.router.clone();
        match key {
            "poison_mode" => {
                router.poison_mode = value.parse().context("Invalid boolean value")?;
            }
            "route_timeout" => {
                router.route_timeout_secs = value.parse().context("Invalid number of seconds")?;
            }
            "timer_interval" => {
                router.timer_interval_secs = value.parse().context("Invalid number of seconds")?;
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }

        router.validate()?;
        self.router = router;
        Ok(())
    }

    /// Get a config value
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "poison_mode" => Some(self.router.poison_mode.to_string()),
            "route_timeout" => Some(self.router.route_timeout_secs.to_string()),
            "timer_interval" => Some(self.router.timer_interval_secs.to_string()),
            _ => None,
        }
    }

    /// List all config values
    pub fn list(&self) -> Vec<(String, String)> {
        vec![
            ("poison_mode".to_string(), self.router.poison_mode.to_string()),
            (
                "route_timeout".to_string(),
                format!("{}s", self.router.route_timeout_secs),
            ),
            (
                "timer_interval".to_string(),
                format!("{}s", self.router.timer_interval_secs),
            ),
        ]
    }
}
