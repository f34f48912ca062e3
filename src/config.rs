use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use tracing::{info, warn};

// Import logging macros
use crate::{log_system_event, log_validation};

/// Complete application configuration loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Database connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Logging system configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        log_system_event!(config, "Loading application configuration from environment variables");

        let database_config = DatabaseConfig::from_env()?;
        let server_config = ServerConfig::from_env()?;
        let logging_config = LoggingConfig::from_env()?;

        let config = Config {
            database: database_config,
            server: server_config,
            logging: logging_config,
        };

        log_system_event!(config, "Configuration loaded successfully");
        config.log_configuration_summary();

        Ok(config)
    }

    /// Log a summary of loaded configuration (without sensitive data)
    fn log_configuration_summary(&self) {
        info!(
            database_url_masked = %mask_sensitive_data(&self.database.url),
            server_address = %format!("{}:{}", self.server.host, self.server.port),
            log_level = %self.logging.level,
            "Configuration summary"
        );
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate database URL format
        if !self.database.url.contains("sqlite:") && !self.database.url.contains("postgres://") {
            return Err(anyhow!("DATABASE_URL must start with 'sqlite:' or 'postgres://'"));
        }

        // Validate server port range
        if self.server.port == 0 {
            return Err(anyhow!("Server port must be greater than 0"));
        }

        // Validate log level
        if !["trace", "debug", "info", "warn", "error"]
            .contains(&self.logging.level.to_lowercase().as_str())
        {
            warn!("Invalid log level '{}', using 'info' as fallback", self.logging.level);
        }

        log_validation!(success, "configuration", "Configuration validation completed successfully");
        Ok(())
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        let url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:ochem_academy.db".to_string());

        Ok(DatabaseConfig { url })
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let port_str = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string());

        let port = port_str.parse::<u16>()
            .map_err(|_| anyhow!("Invalid PORT value: '{}'. Must be a number between 1-65535", port_str))?;

        let host = env::var("HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());

        Ok(ServerConfig { port, host })
    }
}

impl LoggingConfig {
    fn from_env() -> Result<Self> {
        let level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info,ochem_academy=debug".to_string());

        let file_enabled = env::var("LOG_FILE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let console_enabled = env::var("LOG_CONSOLE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let log_directory = env::var("LOG_DIRECTORY")
            .unwrap_or_else(|_| "logs".to_string());

        Ok(LoggingConfig {
            level,
            file_enabled,
            console_enabled,
            log_directory,
        })
    }
}

/// Mask sensitive data in configuration for safe logging
fn mask_sensitive_data(data: &str) -> String {
    if data.len() <= 8 {
        "*".repeat(data.len())
    } else {
        format!("{}***{}", &data[..4], &data[data.len()-4..])
    }
}
