use crate::error::{LogcastError, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiServerConfig,
    /// Broadcast pipeline configuration
    pub broadcast: BroadcastConfig,
    /// Catch-up snapshot configuration
    pub snapshot: SnapshotConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Port for the API server (default: 8001)
    pub port: u16,
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
    /// Allowed CORS origins (comma-separated, empty = localhost only)
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastConfig {
    /// Capacity of the publish channel
    pub channel_capacity: usize,
    /// How long a producer may wait for room in a full channel
    pub publish_timeout: Duration,
    /// Deadline for a single write to one connection
    pub write_timeout: Duration,
    /// Interval between keep-alive pings
    pub ping_interval: Duration,
    /// Deadline for a keep-alive ping write
    pub ping_timeout: Duration,
    /// Optional upper bound on how long one event's fan-out may take
    pub fanout_timeout: Option<Duration>,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 512,
            publish_timeout: Duration::from_millis(100),
            write_timeout: Duration::from_secs(5),
            ping_interval: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(10),
            fanout_timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotConfig {
    /// Persisted log file tailed for new connections
    pub log_file: PathBuf,
    /// Number of trailing lines sent as catch-up
    pub max_lines: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("logs/app.log"),
            max_lines: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let broadcast = BroadcastConfig {
            channel_capacity: parse_env("BROADCAST_CHANNEL_CAPACITY", "512")?,
            publish_timeout: Duration::from_millis(parse_env(
                "BROADCAST_PUBLISH_TIMEOUT_MS",
                "100",
            )?),
            write_timeout: Duration::from_secs(parse_env("BROADCAST_WRITE_TIMEOUT_SECS", "5")?),
            ping_interval: Duration::from_secs(parse_env("BROADCAST_PING_INTERVAL_SECS", "30")?),
            ping_timeout: Duration::from_secs(parse_env("BROADCAST_PING_TIMEOUT_SECS", "10")?),
            fanout_timeout: match env::var("BROADCAST_FANOUT_TIMEOUT_MS") {
                Ok(raw) if !raw.trim().is_empty() => {
                    Some(Duration::from_millis(raw.trim().parse().map_err(|_| {
                        LogcastError::InvalidConfig(
                            "BROADCAST_FANOUT_TIMEOUT_MS must be a valid number".into(),
                        )
                    })?))
                }
                _ => None,
            },
        };

        if broadcast.channel_capacity == 0 {
            return Err(LogcastError::InvalidConfig(
                "BROADCAST_CHANNEL_CAPACITY must be greater than zero".into(),
            ));
        }
        if broadcast.ping_interval.is_zero() {
            return Err(LogcastError::InvalidConfig(
                "BROADCAST_PING_INTERVAL_SECS must be greater than zero".into(),
            ));
        }

        Ok(Config {
            api: ApiServerConfig {
                port: get_env_or("API_PORT", "8001").parse().map_err(|_| {
                    LogcastError::InvalidConfig("API_PORT must be a valid port number".into())
                })?,
                host: get_env_or("API_HOST", "0.0.0.0"),
                cors_origins: get_env_or("CORS_ORIGINS", "")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            broadcast,
            snapshot: SnapshotConfig {
                log_file: PathBuf::from(get_env_or("LOG_FILE", "logs/app.log")),
                max_lines: parse_env("BROADCAST_SNAPSHOT_LINES", "20")?,
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }

    /// Get the API server address
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a numeric environment variable, rejecting malformed values
fn parse_env<T: FromStr>(key: &str, default: &str) -> Result<T> {
    get_env_or(key, default)
        .trim()
        .parse()
        .map_err(|_| LogcastError::InvalidConfig(format!("{} must be a valid number", key)))
}
