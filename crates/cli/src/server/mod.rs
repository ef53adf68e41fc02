use ferrous_doh_domain::ServerConfig;
use ferrous_doh_infrastructure::DohServer;
use tracing::info;

/// Serve until Ctrl-C, then stop gracefully and report the counters.
pub async fn run_frontend(config: &ServerConfig) -> anyhow::Result<()> {
    let server = DohServer::new(config)?;
    server.start().await?;

    if let Some(addr) = server.local_addr().await {
        info!(listen = %addr, "DoH frontend ready, press Ctrl+C to stop");
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    server.stop().await?;

    let stats = server.stats();
    info!(
        queries_received = stats.queries_received,
        connections_accepted = stats.connections_accepted,
        "Final statistics"
    );

    Ok(())
}
