//! Configuration for the `graceful` demo server.

use clap::Parser;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use graceful::Templates;

/// CLI arguments for the demo server.
#[derive(Parser, Debug)]
#[command(name = "graceful")]
#[command(about = "HTTP server that drains in-flight requests on SIGINT/SIGTERM")]
struct CliArgs {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "CONFIG")]
    config: Option<PathBuf>,
}

/// Server configuration.
///
/// Fields use serde defaults that fall back to environment variables,
/// then to hardcoded defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "config_defaults::default_port")]
    port: u16,
    #[serde(default = "config_defaults::default_host")]
    host: IpAddr,
    #[serde(default)]
    shutdown: ShutdownConfig,
}

/// Grace period and status line templates for the shutdown.
#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownConfig {
    /// Human-readable duration, e.g. `"15s"` or `"1m 30s"`.
    #[serde(
        default = "config_defaults::default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    timeout: Duration,
    #[serde(default)]
    templates: Templates,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        ShutdownConfig {
            timeout: config_defaults::default_shutdown_timeout(),
            templates: Templates::default(),
        }
    }
}

impl ShutdownConfig {
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: config_defaults::default_port(),
            host: config_defaults::default_host(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
}

pub mod config_defaults {
    use std::env;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    use graceful::DEFAULT_TIMEOUT;

    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

    /// Returns the default port value with fallback: $PORT env var -> 8080
    pub fn default_port() -> u16 {
        env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT)
    }

    /// Returns the default host value with fallback: $HOST env var -> "0.0.0.0"
    pub fn default_host() -> IpAddr {
        env::var("HOST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_HOST)
    }

    /// Returns the default grace period with fallback: $SHUTDOWN_TIMEOUT env var -> 15s
    pub fn default_shutdown_timeout() -> Duration {
        env::var("SHUTDOWN_TIMEOUT")
            .ok()
            .and_then(|s| humantime::parse_duration(s.trim()).ok())
            .unwrap_or(DEFAULT_TIMEOUT)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    pub fn shutdown(&self) -> &ShutdownConfig {
        &self.shutdown
    }

    /// Load configuration from CLI arguments and JSON file.
    ///
    /// The config file path is determined by:
    /// 1. `--config <path>` CLI argument (or `$CONFIG`)
    /// 2. `./config.json` (if it exists)
    ///
    /// Without a file, every value comes from environment variables or defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let cli_args = CliArgs::parse();
        match cli_args.config {
            Some(path) => Self::load_from_path(&path),
            None => {
                let fallback = Path::new("config.json");
                if fallback.exists() {
                    Self::load_from_path(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        Self::from_json(&content)
    }

    /// Parses configuration from a JSON document.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }
}
