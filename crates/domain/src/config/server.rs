use super::errors::ConfigError;
use super::limits::TransportLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub listen_address: String,

    /// Port number or well-known service name ("https", "domain", ...)
    pub listen_service: String,

    pub backend_address: String,

    pub backend_service: String,

    /// Milliseconds to wait for the backend before answering SERVFAIL
    #[serde(default = "default_backend_timeout_ms")]
    pub backend_timeout_ms: u64,

    pub certificate_path: Option<PathBuf>,

    pub private_key_path: Option<PathBuf>,

    /// PEM certificate chain presented to clients
    #[serde(skip)]
    pub certificate: Option<String>,

    /// PEM private key matching `certificate`
    #[serde(skip)]
    pub private_key: Option<String>,

    #[serde(default)]
    pub limits: TransportLimits,

    /// Drop every outbound datagram (fault injection)
    #[serde(default)]
    pub block_sending: bool,
}

fn default_backend_timeout_ms() -> u64 {
    5_000
}

impl ServerConfig {
    pub fn new(
        listen_address: impl Into<String>,
        listen_service: impl Into<String>,
        backend_address: impl Into<String>,
        backend_service: impl Into<String>,
    ) -> Self {
        Self {
            listen_address: listen_address.into(),
            listen_service: listen_service.into(),
            backend_address: backend_address.into(),
            backend_service: backend_service.into(),
            ..Self::default()
        }
    }

    /// Reads the PEM files named by `certificate_path` / `private_key_path`.
    pub fn load_credentials(&mut self) -> Result<(), ConfigError> {
        if let Some(path) = &self.certificate_path {
            self.certificate = Some(read_pem(path)?);
        }
        if let Some(path) = &self.private_key_path {
            self.private_key = Some(read_pem(path)?);
        }
        Ok(())
    }
}

fn read_pem(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Credentials {
        path: path.to_path_buf(),
        source,
    })
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0".to_string(),
            listen_service: "443".to_string(),
            backend_address: "127.0.0.1".to_string(),
            backend_service: "53".to_string(),
            backend_timeout_ms: default_backend_timeout_ms(),
            certificate_path: None,
            private_key_path: None,
            certificate: None,
            private_key: None,
            limits: TransportLimits::default(),
            block_sending: false,
        }
    }
}
