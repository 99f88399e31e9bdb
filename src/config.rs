//! User configuration (~/.trackport/config.toml)
//!
//! Every field is optional in the file; missing values fall back to
//! defaults. `TRACKPORT_DB` and `TRACKPORT_OFFLINE` override the file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::PortfolioError;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Database file; defaults to ~/.trackport/track_port.db
    pub db_path: Option<PathBuf>,
    /// Portfolios shown when a report names none
    pub default_ports: Vec<String>,
    /// Extra report columns added to the defaults
    pub default_addcols: Vec<String>,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    /// Skip all network fetches
    pub offline: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            default_ports: Vec::new(),
            default_addcols: Vec::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 20,
            offline: false,
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {:?}", path))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| PortfolioError::ConfigError(e.to_string()))?;

        for fpn in &config.default_ports {
            fpn.parse::<crate::db::FilePortName>()?;
        }

        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(path) = std::env::var_os("TRACKPORT_DB") {
            self.db_path = Some(PathBuf::from(path));
        }
        if env_flag("TRACKPORT_OFFLINE") {
            self.offline = true;
        }
    }

    /// `--db` beats the environment, which beats the file
    pub fn with_db_override(mut self, db: Option<PathBuf>) -> Self {
        if db.is_some() {
            self.db_path = db;
        }
        self
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

/// ~/.trackport/config.toml, if HOME is known
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".trackport").join("config.toml"))
}

/// True when the variable is set to anything but "0" or empty
pub fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| !v.is_empty() && v != "0")
        .unwrap_or(false)
}
