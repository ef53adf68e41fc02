use serde::Serialize;

/// Point-in-time copy of the frontend counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Well-formed DNS queries received over DoH since the last clear.
    pub queries_received: u64,

    /// Connections that completed the QUIC/TLS handshake.
    pub connections_accepted: u64,

    /// Established connections that are still open.
    pub alive_connections: u64,
}
