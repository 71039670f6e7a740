//! Configuration management
//!
//! This module handles loading and parsing configuration for the demo server.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults. The `mysql`
//! section is kept as raw plugin options; the plugin validates it.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "MYSQL_PLUGIN_";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Driver configuration
    #[serde(default)]
    pub driver: DriverConfig,
    /// Plugin options, a single entry or a list of entries
    #[serde(default = "default_mysql_options")]
    pub mysql: Value,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            driver: DriverConfig::default(),
            mysql: default_mysql_options(),
        }
    }
}

fn default_mysql_options() -> Value {
    json!({})
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Driver configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Connect while registering instead of on first use
    #[serde(default)]
    pub eager_connect: bool,
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist or is empty, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: format_yaml_error(&e),
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - MYSQL_PLUGIN_SERVER_HOST
    /// - MYSQL_PLUGIN_SERVER_PORT
    /// - MYSQL_PLUGIN_DATABASE_URL (settings of the first entry)
    /// - MYSQL_PLUGIN_DRIVER_EAGER_CONNECT
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var(format!("{}SERVER_HOST", ENV_PREFIX)) {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var(format!("{}SERVER_PORT", ENV_PREFIX)) {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }

        if let Ok(url) = std::env::var(format!("{}DATABASE_URL", ENV_PREFIX)) {
            self.set_first_settings(url);
        }

        if let Ok(eager) = std::env::var(format!("{}DRIVER_EAGER_CONNECT", ENV_PREFIX)) {
            match eager.to_lowercase().as_str() {
                "true" | "1" | "yes" => self.driver.eager_connect = true,
                "false" | "0" | "no" => self.driver.eager_connect = false,
                _ => {} // Ignore invalid values
            }
        }
    }

    /// Replace the `settings` of the first plugin entry.
    ///
    /// Shapes the plugin would reject anyway are left for it to report.
    fn set_first_settings(&mut self, url: String) {
        match &mut self.mysql {
            Value::Null => self.mysql = json!({ "settings": url }),
            Value::Object(entry) => {
                entry.insert("settings".to_string(), Value::String(url));
            }
            Value::Array(entries) => match entries.first_mut() {
                Some(Value::Object(entry)) => {
                    entry.insert("settings".to_string(), Value::String(url));
                }
                None => entries.push(json!({ "settings": url })),
                Some(_) => {}
            },
            _ => {}
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!("at line {}, column {}: {}", location.line(), location.column(), e)
    } else {
        e.to_string()
    }
}

// Shared mutex for config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Server values written to the file come back unchanged.
        #[test]
        fn property_server_section_loads(
            host in "[a-z][a-z0-9.-]{0,20}",
            port in 1u16..,
        ) {
            let mut file = NamedTempFile::new().unwrap();
            write!(file, "server:\n  host: \"{}\"\n  port: {}\n", host, port).unwrap();

            let config = Config::load(file.path()).unwrap();

            prop_assert_eq!(config.server.host, host);
            prop_assert_eq!(config.server.port, port);
            prop_assert_eq!(config.mysql, json!({}));
        }
    }
}
