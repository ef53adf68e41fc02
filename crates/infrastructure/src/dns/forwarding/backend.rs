use super::{tcp, udp};
use crate::dns::message::DnsMessage;
use async_trait::async_trait;
use ferrous_doh_application::ports::DnsForwarder;
use ferrous_doh_domain::DomainError;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::debug;

/// Plain-DNS forwarder to a single backend resolver.
///
/// Queries go out over UDP; a truncated answer is retried once over TCP.
pub struct BackendForwarder {
    backend: SocketAddr,
    timeout: Duration,
}

impl BackendForwarder {
    pub fn new(backend: SocketAddr, timeout: Duration) -> Self {
        Self { backend, timeout }
    }
}

#[async_trait]
impl DnsForwarder for BackendForwarder {
    async fn forward(&self, query: &[u8]) -> Result<Vec<u8>, DomainError> {
        let response = udp::exchange(self.backend, query, self.timeout).await?;

        if !DnsMessage::is_truncated(&response) {
            return Ok(response);
        }

        debug!(backend = %self.backend, "Truncated UDP answer, retrying over TCP");
        tcp::exchange(self.backend, query, self.timeout).await
    }

    fn backend_addr(&self) -> SocketAddr {
        self.backend
    }
}
