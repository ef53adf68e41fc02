use super::connection::{serve_connection, ConnectionContext};
use quinn::Endpoint;
use tracing::{debug, info};

/// Hand every incoming QUIC connection to its own task until cancelled.
pub async fn accept_loop(endpoint: Endpoint, ctx: ConnectionContext) {
    info!(local_addr = ?endpoint.local_addr().ok(), "DoH listener accepting connections");

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            incoming = endpoint.accept() => match incoming {
                Some(incoming) => {
                    debug!(remote = %incoming.remote_address(), "Incoming QUIC connection");
                    ctx.tracker.spawn(serve_connection(incoming, ctx.clone()));
                }
                None => break,
            },
        }
    }

    debug!("DoH listener stopped accepting");
}
