//! # Ferrous DoH
//!
//! Standalone DNS-over-HTTPS frontend: terminates DoH over HTTP/3 and relays
//! the queries to a plain DNS backend.

mod bootstrap;
mod server;

use clap::Parser;
use ferrous_doh_domain::CliOverrides;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ferrous-doh")]
#[command(version)]
#[command(about = "DNS-over-HTTPS (HTTP/3) frontend for a plain DNS backend")]
struct Cli {
    /// TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<String>,

    /// Listen address
    #[arg(short = 'l', long)]
    listen: Option<String>,

    /// Listen UDP port
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Backend resolver address
    #[arg(short = 'b', long)]
    backend: Option<String>,

    /// Backend resolver port
    #[arg(long)]
    backend_port: Option<u16>,

    /// PEM certificate chain
    #[arg(long)]
    cert: Option<PathBuf>,

    /// PEM private key
    #[arg(long)]
    key: Option<PathBuf>,

    /// Log level or filter directive
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            listen_address: self.listen.clone(),
            listen_port: self.port,
            backend_address: self.backend.clone(),
            backend_port: self.backend_port,
            certificate_path: self.cert.clone(),
            private_key_path: self.key.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = bootstrap::load_config(cli.config.as_deref(), cli.overrides())?;
    bootstrap::init_logging(&config);
    bootstrap::config::log_config(cli.config.as_deref(), &config);

    server::run_frontend(&config.server).await
}
