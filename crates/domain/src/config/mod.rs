//! Configuration module for Ferrous DoH
//!
//! - `root`: Main configuration and CLI overrides
//! - `server`: Listen/backend endpoints and TLS identity
//! - `limits`: QUIC transport limits adjustable at runtime
//! - `logging`: Logging settings
//! - `errors`: Configuration errors

pub mod errors;
pub mod limits;
pub mod logging;
pub mod root;
pub mod server;

pub use errors::ConfigError;
pub use limits::TransportLimits;
pub use logging::LoggingConfig;
pub use root::{CliOverrides, Config};
pub use server::ServerConfig;
