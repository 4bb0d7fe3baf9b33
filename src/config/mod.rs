//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

use crate::util::time::DEFAULT_TICK_RATE;

const DEV_SESSION_SECRET: &str = "dev-insecure-secret";

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Simulation/publish tick rate in Hz
    pub tick_rate: u32,

    /// Secret used to sign session resume tokens
    pub session_secret: String,
    /// True when no SESSION_SECRET was provided and the dev default is used
    pub session_secret_is_default: bool,
    /// Session token lifetime in seconds
    pub session_ttl_sec: u64,
    /// Players whose session is idle past this are removed from their room
    pub session_idle_timeout_ms: u64,

    /// Allowed client origins for CORS ("*" or a comma-separated list)
    pub client_origin: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosted platforms provide PORT; fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8787".to_string())
        };

        let tick_rate = env::var("TICK_RATE")
            .ok()
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|rate| *rate > 0)
            .unwrap_or(DEFAULT_TICK_RATE);

        let session_secret = env::var("SESSION_SECRET")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let session_secret_is_default = session_secret.is_none();

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            tick_rate,

            session_secret: session_secret.unwrap_or_else(|| DEV_SESSION_SECRET.to_string()),
            session_secret_is_default,
            session_ttl_sec: env::var("SESSION_TTL_SEC")
                .ok()
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .unwrap_or(12 * 60 * 60),
            session_idle_timeout_ms: env::var("SESSION_IDLE_TIMEOUT_MS")
                .ok()
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .unwrap_or(45_000),

            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,
}
