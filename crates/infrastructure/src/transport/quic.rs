use super::socket::{FaultInjectingSocket, SendGate};
use ferrous_doh_domain::{DomainError, TransportLimits};
use quinn::crypto::rustls::QuicServerConfig;
use quinn::{Endpoint, EndpointConfig, IdleTimeout, TransportConfig, VarInt};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use tracing::debug;

/// HTTP/3 H3_NO_ERROR, used for graceful CONNECTION_CLOSE (RFC 9114 §8.1)
pub const H3_NO_ERROR: u32 = 0x100;

/// Unidirectional streams per connection; HTTP/3 needs at least three
/// (control plus the two QPACK streams).
const MAX_CONCURRENT_UNI_STREAMS: u32 = 100;

/// A bound QUIC endpoint plus a weak handle on its socket.
///
/// The weak handle upgrades for as long as the endpoint driver still owns the
/// UDP socket, which lets shutdown wait for the port to be released.
pub struct BoundEndpoint {
    pub endpoint: Endpoint,
    pub socket: Weak<FaultInjectingSocket>,
}

fn varint(name: &str, value: u64) -> Result<VarInt, DomainError> {
    VarInt::from_u64(value)
        .map_err(|_| DomainError::InvalidLimit(format!("{} out of range: {}", name, value)))
}

/// Translate the runtime limits into quinn transport parameters.
pub fn build_transport_config(limits: &TransportLimits) -> Result<TransportConfig, DomainError> {
    let idle_timeout = match limits.max_idle_timeout_ms {
        0 => None,
        ms => Some(IdleTimeout::from(varint("max_idle_timeout", ms)?)),
    };

    let mut transport = TransportConfig::default();
    transport
        .max_idle_timeout(idle_timeout)
        .max_concurrent_bidi_streams(varint("max_streams_bidi", limits.max_streams_bidi)?)
        .max_concurrent_uni_streams(VarInt::from_u32(MAX_CONCURRENT_UNI_STREAMS))
        .receive_window(varint("max_buffer_size", limits.max_buffer_size)?)
        .stream_receive_window(varint("max_buffer_size", limits.stream_window())?);

    Ok(transport)
}

pub fn build_server_config(
    crypto: Arc<QuicServerConfig>,
    limits: &TransportLimits,
) -> Result<quinn::ServerConfig, DomainError> {
    let mut server_config = quinn::ServerConfig::with_crypto(crypto);
    server_config.transport_config(Arc::new(build_transport_config(limits)?));
    // Only the listening address is served; clients must not migrate.
    server_config.migration(false);
    Ok(server_config)
}

/// Bind `addr` and start a QUIC server endpoint whose sends go through `gate`.
///
/// Must run inside a Tokio runtime: the endpoint driver is spawned onto it.
pub fn bind_endpoint(
    addr: SocketAddr,
    server_config: quinn::ServerConfig,
    gate: SendGate,
) -> Result<BoundEndpoint, DomainError> {
    let socket = bind_udp(addr)
        .map_err(|e| DomainError::Bind(format!("Failed to bind UDP {}: {}", addr, e)))?;

    let runtime: Arc<dyn quinn::Runtime> = Arc::new(quinn::TokioRuntime);
    let inner = runtime
        .wrap_udp_socket(socket)
        .map_err(|e| DomainError::Bind(format!("Failed to register UDP socket: {}", e)))?;

    let socket = Arc::new(FaultInjectingSocket::new(inner, gate));
    let weak = Arc::downgrade(&socket);

    let endpoint = Endpoint::new_with_abstract_socket(
        EndpointConfig::default(),
        Some(server_config),
        socket,
        runtime,
    )
    .map_err(|e| DomainError::Bind(format!("Failed to create QUIC endpoint: {}", e)))?;

    debug!(local_addr = ?endpoint.local_addr().ok(), "QUIC endpoint bound");

    Ok(BoundEndpoint {
        endpoint,
        socket: weak,
    })
}

fn bind_udp(addr: SocketAddr) -> std::io::Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    Ok(socket.into())
}
