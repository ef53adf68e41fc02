use async_trait::async_trait;
use ferrous_doh_domain::DomainError;
use std::net::SocketAddr;

/// Relays wire-format DNS queries to the backend resolver.
#[async_trait]
pub trait DnsForwarder: Send + Sync {
    /// Send `query` to the backend and return its answer verbatim.
    ///
    /// Fails with `BackendUnreachable` or `BackendTimeout`.
    async fn forward(&self, query: &[u8]) -> Result<Vec<u8>, DomainError>;

    fn backend_addr(&self) -> SocketAddr;
}
