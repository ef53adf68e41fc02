use crate::doh::DohHandler;
use crate::transport::quic::H3_NO_ERROR;
use bytes::Bytes;
use ferrous_doh_application::services::StatsRegistry;
use ferrous_doh_domain::TransportLimits;
use quinn::VarInt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// How long a stopping connection waits for the peer to close first.
const CLOSE_LINGER: Duration = Duration::from_millis(50);

/// Everything a connection task needs, shared by all connections of a server.
///
/// `cancel` starts a graceful shutdown: no new connections or requests are
/// accepted, but requests already accepted run to completion. `abort` cuts
/// those requests short once the server stops waiting for them.
#[derive(Clone)]
pub struct ConnectionContext {
    pub handler: Arc<DohHandler>,
    pub stats: Arc<StatsRegistry>,
    pub limits: watch::Receiver<TransportLimits>,
    pub cancel: CancellationToken,
    pub abort: CancellationToken,
    pub tracker: TaskTracker,
}

/// Keeps `alive_connections` in step with the connection task's lifetime.
struct AliveGuard(Arc<StatsRegistry>);

impl AliveGuard {
    fn new(stats: Arc<StatsRegistry>) -> Self {
        stats.record_connection_accepted();
        Self(stats)
    }
}

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.0.record_connection_closed();
    }
}

pub async fn serve_connection(incoming: quinn::Incoming, mut ctx: ConnectionContext) {
    let remote = incoming.remote_address();

    let connecting = match incoming.accept() {
        Ok(connecting) => connecting,
        Err(e) => {
            debug!(remote = %remote, error = %e, "Refused incoming connection");
            return;
        }
    };

    let connection = tokio::select! {
        _ = ctx.cancel.cancelled() => return,
        result = connecting => match result {
            Ok(connection) => connection,
            Err(e) => {
                debug!(remote = %remote, error = %e, "QUIC handshake failed");
                return;
            }
        },
    };

    let _alive = AliveGuard::new(Arc::clone(&ctx.stats));
    let limits = *ctx.limits.borrow_and_update();
    debug!(
        remote = %remote,
        id = connection.stable_id(),
        max_streams_bidi = limits.max_streams_bidi,
        "Connection established"
    );

    let h3_conn = tokio::select! {
        _ = ctx.cancel.cancelled() => {
            connection.close(VarInt::from_u32(H3_NO_ERROR), b"shutdown");
            return;
        }
        result = h3::server::Connection::<_, Bytes>::new(h3_quinn::Connection::new(connection.clone())) => {
            match result {
                Ok(h3_conn) => h3_conn,
                Err(e) => {
                    debug!(remote = %remote, error = %e, "HTTP/3 setup failed");
                    return;
                }
            }
        }
    };

    serve_requests(h3_conn, &connection, remote, limits, &mut ctx).await;

    debug!(remote = %remote, id = connection.stable_id(), "Connection finished");
}

async fn serve_requests(
    mut h3_conn: h3::server::Connection<h3_quinn::Connection, Bytes>,
    connection: &quinn::Connection,
    remote: SocketAddr,
    limits: TransportLimits,
    ctx: &mut ConnectionContext,
) {
    let body_limit = limits.request_body_limit();
    let mut stream_cap = limits.max_streams_bidi;
    let mut limits_open = true;
    let requests = TaskTracker::new();

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => {
                // GOAWAY names the first stream that will not be processed
                if let Err(e) = h3_conn.shutdown(1).await {
                    debug!(remote = %remote, error = %e, "GOAWAY not sent");
                }
                drain_requests(&requests, ctx, remote).await;
                // Lets queued response frames leave before CONNECTION_CLOSE
                let _ = tokio::time::timeout(CLOSE_LINGER, connection.closed()).await;
                connection.close(VarInt::from_u32(H3_NO_ERROR), b"shutdown");
                return;
            }
            changed = ctx.limits.changed(), if limits_open => {
                if changed.is_err() {
                    limits_open = false;
                    continue;
                }
                let streams = ctx.limits.borrow_and_update().max_streams_bidi;
                // Stream credit already granted cannot be revoked, only extended
                if streams <= stream_cap {
                    continue;
                }
                match VarInt::from_u64(streams) {
                    Ok(raised) => {
                        connection.set_max_concurrent_bi_streams(raised);
                        debug!(remote = %remote, from = stream_cap, to = streams, "Stream limit raised");
                        stream_cap = streams;
                    }
                    Err(_) => warn!(streams, "Stream limit out of range, not applied"),
                }
            }
            accepted = h3_conn.accept() => match accepted {
                Ok(Some(resolver)) => {
                    let handler = Arc::clone(&ctx.handler);
                    let abort = ctx.abort.clone();
                    requests.spawn(async move {
                        let exchange = async {
                            let (request, stream) = resolver.resolve_request().await.map_err(|e| {
                                debug!(remote = %remote, error = %e, "Unreadable request headers");
                            })?;
                            handler.handle(request, stream, body_limit).await.map_err(|e| {
                                debug!(remote = %remote, error = %e, "DoH stream aborted");
                            })
                        };
                        tokio::select! {
                            _ = abort.cancelled() => {
                                debug!(remote = %remote, "Request abandoned at shutdown");
                            }
                            _ = exchange => {}
                        }
                    });
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(remote = %remote, error = %e, "Connection closed");
                    break;
                }
            },
        }
    }

    drain_requests(&requests, ctx, remote).await;
}

/// Wait for every accepted request of this connection, or for the hard stop.
async fn drain_requests(requests: &TaskTracker, ctx: &ConnectionContext, remote: SocketAddr) {
    requests.close();
    if requests.is_empty() {
        return;
    }
    debug!(remote = %remote, in_flight = requests.len(), "Draining requests");
    tokio::select! {
        _ = requests.wait() => {}
        _ = ctx.abort.cancelled() => requests.wait().await,
    }
}
