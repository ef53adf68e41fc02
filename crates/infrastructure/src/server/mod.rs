//! DoH server lifecycle
//!
//! [`DohServer`] owns the configuration, the counters and the runtime knobs of
//! one frontend. `start` binds the QUIC endpoint and spawns the acceptor;
//! `stop` stops accepting, lets accepted requests finish, closes the endpoint
//! and waits until the UDP socket is released so the same port can be bound
//! again right away.

pub mod acceptor;
pub mod connection;

use crate::dns::forwarding::BackendForwarder;
use crate::doh::DohHandler;
use crate::transport::quic::H3_NO_ERROR;
use crate::transport::{
    bind_endpoint, build_quic_crypto, build_server_config, build_transport_config,
    FaultInjectingSocket, SendGate,
};
use connection::ConnectionContext;
use ferrous_doh_application::ports::DnsForwarder;
use ferrous_doh_application::services::StatsRegistry;
use ferrous_doh_application::use_cases::ForwardQueryUseCase;
use ferrous_doh_domain::{resolve_endpoint, DomainError, ServerConfig, Stats, TransportLimits};
use quinn::crypto::rustls::QuicServerConfig;
use quinn::{Endpoint, VarInt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Upper bound on waiting for in-flight requests at stop.
const REQUEST_DRAIN_TIMEOUT: Duration = Duration::from_secs(3);

/// Upper bound on waiting for closed connections to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(3);

const SOCKET_RELEASE_POLL: Duration = Duration::from_millis(10);
const SOCKET_RELEASE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct DohServer {
    listen: SocketAddr,
    backend: SocketAddr,
    stats: Arc<StatsRegistry>,
    handler: Arc<DohHandler>,
    limits: watch::Sender<TransportLimits>,
    gate: SendGate,
    state: Mutex<ServerState>,
    /// Set by the first successful start; knobs are refused before that.
    ever_started: AtomicBool,
}

#[derive(Default)]
struct ServerState {
    certificate: Option<String>,
    private_key: Option<String>,
    running: Option<Running>,
}

struct Running {
    endpoint: Endpoint,
    socket: Weak<FaultInjectingSocket>,
    crypto: Arc<QuicServerConfig>,
    cancel: CancellationToken,
    abort: CancellationToken,
    tracker: TaskTracker,
}

impl DohServer {
    /// Resolve the listen and backend endpoints and wire the components.
    ///
    /// Nothing is bound until [`DohServer::start`].
    pub fn new(config: &ServerConfig) -> Result<Self, DomainError> {
        let listen = resolve_endpoint(&config.listen_address, &config.listen_service)?;
        let backend = resolve_endpoint(&config.backend_address, &config.backend_service)?;
        build_transport_config(&config.limits)
            .map_err(|e| DomainError::Initialization(e.to_string()))?;

        let forwarder: Arc<dyn DnsForwarder> = Arc::new(BackendForwarder::new(
            backend,
            Duration::from_millis(config.backend_timeout_ms),
        ));
        let stats = Arc::new(StatsRegistry::new());
        let use_case = Arc::new(ForwardQueryUseCase::new(forwarder, Arc::clone(&stats)));
        let (limits, _) = watch::channel(config.limits);

        debug!(listen = %listen, backend = %backend, "DoH server created");

        Ok(Self {
            listen,
            backend,
            stats,
            handler: Arc::new(DohHandler::new(use_case)),
            limits,
            gate: SendGate::new(config.block_sending),
            state: Mutex::new(ServerState {
                certificate: config.certificate.clone(),
                private_key: config.private_key.clone(),
                running: None,
            }),
            ever_started: AtomicBool::new(false),
        })
    }

    /// PEM certificate chain used by the next `start`.
    pub async fn set_certificate(&self, pem: impl Into<String>) {
        self.state.lock().await.certificate = Some(pem.into());
    }

    /// PEM private key used by the next `start`.
    pub async fn set_private_key(&self, pem: impl Into<String>) {
        self.state.lock().await.private_key = Some(pem.into());
    }

    /// Bind the listener and start serving. Calling it on a running server is a no-op.
    ///
    /// Must be called from inside a Tokio runtime, which then drives the endpoint.
    pub async fn start(&self) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        if state.running.is_some() {
            debug!(listen = %self.listen, "Start requested on running server");
            return Ok(());
        }

        let (certificate, private_key) = match (&state.certificate, &state.private_key) {
            (Some(certificate), Some(private_key)) => (certificate, private_key),
            _ => {
                return Err(DomainError::Bind(
                    "Certificate and private key must be installed before start".to_string(),
                ))
            }
        };

        let crypto = build_quic_crypto(certificate, private_key)?;
        let limits = *self.limits.borrow();
        let server_config = build_server_config(Arc::clone(&crypto), &limits)?;
        let bound = bind_endpoint(self.listen, server_config, self.gate.clone())?;

        let cancel = CancellationToken::new();
        let abort = CancellationToken::new();
        let tracker = TaskTracker::new();
        let ctx = ConnectionContext {
            handler: Arc::clone(&self.handler),
            stats: Arc::clone(&self.stats),
            limits: self.limits.subscribe(),
            cancel: cancel.clone(),
            abort: abort.clone(),
            tracker: tracker.clone(),
        };
        tracker.spawn(acceptor::accept_loop(bound.endpoint.clone(), ctx));

        info!(
            listen = ?bound.endpoint.local_addr().ok(),
            backend = %self.backend,
            "DoH server started"
        );

        state.running = Some(Running {
            endpoint: bound.endpoint,
            socket: bound.socket,
            crypto,
            cancel,
            abort,
            tracker,
        });
        self.ever_started.store(true, Ordering::Release);
        Ok(())
    }

    /// Close every connection gracefully and release the socket.
    ///
    /// Requests already accepted get up to [`REQUEST_DRAIN_TIMEOUT`] to be
    /// answered; whatever is left after that is abandoned. Returns once all
    /// connection and request tasks have finished.
    pub async fn stop(&self) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        let running = state.running.take().ok_or(DomainError::NotRunning)?;

        running.cancel.cancel();
        running.tracker.close();
        if tokio::time::timeout(REQUEST_DRAIN_TIMEOUT, running.tracker.wait())
            .await
            .is_err()
        {
            warn!(listen = %self.listen, "Abandoning requests still in flight at shutdown");
            running.abort.cancel();
            running.tracker.wait().await;
        }

        running
            .endpoint
            .close(VarInt::from_u32(H3_NO_ERROR), b"server stopping");
        if tokio::time::timeout(DRAIN_TIMEOUT, running.endpoint.wait_idle())
            .await
            .is_err()
        {
            warn!(listen = %self.listen, "Connections still draining at shutdown");
        }

        let socket = running.socket;
        drop(running.endpoint);
        wait_for_release(&socket).await;

        info!(listen = %self.listen, "DoH server stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running.is_some()
    }

    /// Address actually bound, `None` while stopped.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        let state = self.state.lock().await;
        state
            .running
            .as_ref()
            .and_then(|running| running.endpoint.local_addr().ok())
    }

    pub fn stats(&self) -> Stats {
        self.stats.snapshot()
    }

    pub fn clear_queries(&self) {
        self.stats.clear_queries();
    }

    /// Idle timeout for connections accepted from now on; `0` disables it.
    ///
    /// Like the other knobs this fails with [`DomainError::NotRunning`] until
    /// the server has been started once. A stopped server keeps the value for
    /// its next start.
    pub async fn set_max_idle_timeout(&self, ms: u64) -> Result<(), DomainError> {
        self.update_limits(|limits| limits.max_idle_timeout_ms = ms)
            .await
    }

    /// Receive windows and request-body bound for connections accepted from now on.
    pub async fn set_max_buffer_size(&self, bytes: u64) -> Result<(), DomainError> {
        self.update_limits(|limits| limits.max_buffer_size = bytes)
            .await
    }

    /// Concurrent bidirectional streams per connection.
    ///
    /// New connections get the new cap. Live connections only follow a raise,
    /// since stream credit already granted to a peer cannot be taken back.
    pub async fn set_max_streams_bidi(&self, streams: u64) -> Result<(), DomainError> {
        self.update_limits(|limits| limits.max_streams_bidi = streams)
            .await
    }

    /// Drop (`true`) or resume (`false`) every outbound datagram.
    pub fn block_sending(&self, blocked: bool) -> Result<(), DomainError> {
        self.ensure_started()?;
        info!(blocked, "Outbound datagrams {}", if blocked { "blocked" } else { "resumed" });
        self.gate.set_blocked(blocked);
        Ok(())
    }

    pub fn limits(&self) -> TransportLimits {
        *self.limits.borrow()
    }

    fn ensure_started(&self) -> Result<(), DomainError> {
        if self.ever_started.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(DomainError::NotRunning)
        }
    }

    async fn update_limits(
        &self,
        update: impl FnOnce(&mut TransportLimits),
    ) -> Result<(), DomainError> {
        self.ensure_started()?;
        let state = self.state.lock().await;

        let mut limits = *self.limits.borrow();
        update(&mut limits);
        build_transport_config(&limits)?;

        if let Some(running) = &state.running {
            let server_config = build_server_config(Arc::clone(&running.crypto), &limits)?;
            running.endpoint.set_server_config(Some(server_config));
        }

        self.limits.send_replace(limits);
        debug!(?limits, "Transport limits updated");
        Ok(())
    }
}

/// Wait until the endpoint driver has dropped the socket.
async fn wait_for_release(socket: &Weak<FaultInjectingSocket>) {
    let deadline = tokio::time::Instant::now() + SOCKET_RELEASE_TIMEOUT;

    while socket.strong_count() > 0 {
        if tokio::time::Instant::now() >= deadline {
            warn!("UDP socket still held after shutdown");
            return;
        }
        tokio::time::sleep(SOCKET_RELEASE_POLL).await;
    }
}
