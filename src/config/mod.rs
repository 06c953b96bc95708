//! Configuration module for the roster backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Passphrase shipped with the original check-in board.
pub const DEFAULT_SHARED_SECRET: &str = "mrhs";

/// Collection the check-in documents live in.
pub const DEFAULT_COLLECTION: &str = "Classrooms";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared passphrase gating every roster mutation
    pub shared_secret: String,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Remote collection holding the roster documents
    pub collection: String,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Raised when an environment variable holds an unusable value.
#[derive(Debug)]
pub struct ConfigError {
    pub variable: &'static str,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}: {}", self.variable, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let shared_secret = env::var("VELVET_SHARED_SECRET")
            .unwrap_or_else(|_| DEFAULT_SHARED_SECRET.to_string());

        let db_path = env::var("VELVET_DB_PATH")
            .unwrap_or_else(|_| "./data/roster.sqlite".to_string())
            .into();

        let collection =
            env::var("VELVET_COLLECTION").unwrap_or_else(|_| DEFAULT_COLLECTION.to_string());

        let bind_addr = env::var("VELVET_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError {
                variable: "VELVET_BIND_ADDR",
                message: e.to_string(),
            })?;

        let log_level = env::var("VELVET_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            shared_secret,
            db_path,
            collection,
            bind_addr,
            log_level,
        })
    }

    /// Whether the board still runs on the passphrase it shipped with.
    pub fn uses_default_secret(&self) -> bool {
        self.shared_secret == DEFAULT_SHARED_SECRET
    }
}
