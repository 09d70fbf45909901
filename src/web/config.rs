//! Web server configuration module
//!
//! Server settings loaded from environment variables (via `.env` in
//! development) with sensible defaults.

use serde::{Deserialize, Serialize};

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Server bind address (e.g. "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Server port number
    pub port: u16,
    /// Path to the SQLite scheduler database
    pub database_path: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_path: "pressflow.db".to_string(),
        }
    }
}

impl WebConfig {
    /// Creates a config with the given database path and defaults otherwise
    pub fn new(database_path: String) -> Self {
        Self {
            database_path,
            ..Default::default()
        }
    }

    /// Sets the server port (builder pattern)
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the bind address (builder pattern)
    pub fn with_host(mut self, host: String) -> Self {
        self.host = host;
        self
    }

    /// Loads overrides from `PRESSFLOW_HOST`, `PRESSFLOW_PORT`, and
    /// `PRESSFLOW_DB`; unset or malformed variables keep defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = std::env::var("PRESSFLOW_HOST") {
            if !host.is_empty() {
                config.host = host;
            }
        }
        if let Ok(port) = std::env::var("PRESSFLOW_PORT") {
            if let Ok(port) = port.parse() {
                config.port = port;
            }
        }
        if let Ok(db) = std::env::var("PRESSFLOW_DB") {
            if !db.is_empty() {
                config.database_path = db;
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides() {
        let config = WebConfig::new("test.db".to_string())
            .with_port(9000)
            .with_host("127.0.0.1".to_string());
        assert_eq!(config.database_path, "test.db");
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "127.0.0.1");
    }
}
