//! Ferrous DoH Domain Layer
pub mod config;
pub mod endpoint;
pub mod errors;
pub mod stats;

pub use config::{
    CliOverrides, Config, ConfigError, LoggingConfig, ServerConfig, TransportLimits,
};
pub use endpoint::resolve_endpoint;
pub use errors::DomainError;
pub use stats::Stats;
