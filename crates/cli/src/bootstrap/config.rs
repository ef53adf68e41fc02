use ferrous_doh_domain::{CliOverrides, Config};
use tracing::info;

pub fn load_config(
    config_path: Option<&str>,
    cli_overrides: CliOverrides,
) -> anyhow::Result<Config> {
    let config = Config::load(config_path, cli_overrides)?;
    config.validate()?;
    Ok(config)
}

/// Logged once the subscriber is installed, which needs the config first.
pub fn log_config(config_path: Option<&str>, config: &Config) {
    info!(
        config_file = config_path.unwrap_or("default"),
        listen = %config.server.listen_address,
        listen_service = %config.server.listen_service,
        backend = %config.server.backend_address,
        backend_service = %config.server.backend_service,
        max_idle_timeout_ms = config.server.limits.max_idle_timeout_ms,
        max_buffer_size = config.server.limits.max_buffer_size,
        max_streams_bidi = config.server.limits.max_streams_bidi,
        "Configuration loaded"
    );
}
