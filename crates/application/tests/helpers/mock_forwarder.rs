#![allow(dead_code)]

use async_trait::async_trait;
use ferrous_doh_application::ports::DnsForwarder;
use ferrous_doh_domain::DomainError;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

// ============================================================================
// Mock DnsForwarder
// ============================================================================

#[derive(Clone)]
pub struct MockDnsForwarder {
    failure: Arc<RwLock<Option<DomainError>>>,
    calls: Arc<AtomicUsize>,
}

impl MockDnsForwarder {
    pub fn new() -> Self {
        Self {
            failure: Arc::new(RwLock::new(None)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make every subsequent forward fail with `error`.
    pub async fn fail_with(&self, error: DomainError) {
        *self.failure.write().await = Some(error);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DnsForwarder for MockDnsForwarder {
    async fn forward(&self, query: &[u8]) -> Result<Vec<u8>, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.failure.read().await.clone() {
            return Err(error);
        }

        // Echo the query back with the QR bit set.
        let mut answer = query.to_vec();
        if answer.len() > 2 {
            answer[2] |= 0x80;
        }
        Ok(answer)
    }

    fn backend_addr(&self) -> SocketAddr {
        "127.0.0.1:53".parse().unwrap()
    }
}
