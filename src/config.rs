use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_DESCRIPTOR_URL: &str =
    "https://raw.githubusercontent.com/turtlecoin/turtlecoin-pools-json/v2/turtlecoin-pools.json";

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_ip: Option<String>,
    pub port: Option<u16>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PoolsConfig {
    pub descriptor_url: String,
    pub poll_interval_secs: u64,
    pub descriptor_refresh_secs: u64,
    /// Blocks a pool may sit away from consensus before it counts as forked.
    pub max_divergence: u64,
    pub request_timeout_secs: u64,
    /// Stop the descriptor loop after its first failed refresh.
    pub stop_on_descriptor_failure: bool,
}

impl Default for PoolsConfig {
    fn default() -> Self {
        PoolsConfig {
            descriptor_url: DEFAULT_DESCRIPTOR_URL.to_string(),
            poll_interval_secs: 30,
            descriptor_refresh_secs: 3600,
            max_divergence: 5,
            request_timeout_secs: 10,
            stop_on_descriptor_failure: true,
        }
    }
}

impl PoolsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn descriptor_refresh(&self) -> Duration {
        Duration::from_secs(self.descriptor_refresh_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub pools: PoolsConfig,
}

impl AppConfig {
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = self.server.listen_ip.as_deref().unwrap_or("0.0.0.0");
        let port = self.server.port.unwrap_or(8080);
        Ok(format!("{}:{}", ip, port).parse()?)
    }
}

/// Loads the TOML config at `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config_str = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(AppConfig::default());
        }
        Err(e) => return Err(e.into()),
    };
    parse_config(&config_str)
}

pub fn parse_config(s: &str) -> Result<AppConfig, ConfigError> {
    Ok(toml::from_str(s)?)
}
