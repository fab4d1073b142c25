//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Where the engine listens and how long to wait for it
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Test plan execution settings
    #[serde(default)]
    pub testing: TestingConfig,
}

/// Connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Engine host
    #[serde(default = "default_host")]
    pub host: String,

    /// Engine control port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Timeout for establishing the connection
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Timeout for each response once connected, 0 waits forever
    #[serde(default)]
    pub response_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_secs: default_connect_timeout(),
            response_timeout_secs: 0,
        }
    }
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        match self.response_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    19999
}
fn default_connect_timeout() -> u64 {
    5
}

/// Test plan execution settings
#[derive(Debug, Clone, Deserialize)]
pub struct TestingConfig {
    /// Pause between consecutive cases
    #[serde(default = "default_case_delay")]
    pub case_delay_ms: u64,

    /// Custom YAML plan used instead of the built-in one
    #[serde(default)]
    pub plan: Option<PathBuf>,
}

impl Default for TestingConfig {
    fn default() -> Self {
        Self {
            case_delay_ms: default_case_delay(),
            plan: None,
        }
    }
}

fn default_case_delay() -> u64 {
    200
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}
