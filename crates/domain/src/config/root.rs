use super::errors::ConfigError;
use super::logging::LoggingConfig;
use super::server::ServerConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration loaded from a TOML file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub listen_address: Option<String>,
    pub listen_port: Option<u16>,
    pub backend_address: Option<String>,
    pub backend_port: Option<u16>,
    pub certificate_path: Option<PathBuf>,
    pub private_key_path: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl Config {
    /// Load from `path` (or defaults), apply overrides and read the TLS files.
    pub fn load(path: Option<&str>, overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| {
                    ConfigError::FileRead {
                        path: PathBuf::from(path),
                        source,
                    }
                })?;
                toml::from_str(&raw)?
            }
            None => Config::default(),
        };

        config.apply_overrides(overrides);
        config.server.load_credentials()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: CliOverrides) {
        if let Some(address) = overrides.listen_address {
            self.server.listen_address = address;
        }
        if let Some(port) = overrides.listen_port {
            self.server.listen_service = port.to_string();
        }
        if let Some(address) = overrides.backend_address {
            self.server.backend_address = address;
        }
        if let Some(port) = overrides.backend_port {
            self.server.backend_service = port.to_string();
        }
        if let Some(path) = overrides.certificate_path {
            self.server.certificate_path = Some(path);
        }
        if let Some(path) = overrides.private_key_path {
            self.server.private_key_path = Some(path);
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.listen_address.trim().is_empty() {
            return Err(ConfigError::Validation(
                "server.listen_address must not be empty".to_string(),
            ));
        }
        if self.server.backend_address.trim().is_empty() {
            return Err(ConfigError::Validation(
                "server.backend_address must not be empty".to_string(),
            ));
        }
        if self.server.backend_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "server.backend_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.server.certificate.is_none() || self.server.private_key.is_none() {
            return Err(ConfigError::Validation(
                "server.certificate_path and server.private_key_path are required".to_string(),
            ));
        }
        Ok(())
    }
}
