//! Error types.

/// Failures while talking to a pool or the descriptor host.
///
/// All of these are recovered at the collector boundary; only descriptor
/// fetches let them reach a caller.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error: {0}")]
    Status(reqwest::StatusCode),

    #[error("decode error: {0}")]
    Decode(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("unsupported pool type: {0}")]
    UnsupportedPoolType(String),
}

impl PoolError {
    pub fn parse(msg: impl Into<String>) -> Self {
        PoolError::Parse(msg.into())
    }

    /// Coarse error kind, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            PoolError::Network(_) | PoolError::Status(_) => "network",
            PoolError::Decode(_) => "decode",
            PoolError::Parse(_) => "parse",
            PoolError::UnsupportedPoolType(_) => "unsupported",
        }
    }
}

impl From<serde_json::Error> for PoolError {
    fn from(e: serde_json::Error) -> Self {
        PoolError::Parse(e.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid listen address: {0}")]
    Address(#[from] std::net::AddrParseError),
}
