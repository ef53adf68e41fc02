use crate::ports::DnsForwarder;
use crate::services::StatsRegistry;
use ferrous_doh_domain::DomainError;
use std::sync::Arc;
use tracing::{debug, warn};

/// Counts an accepted DoH query and relays it to the backend.
///
/// Callers must only pass messages that already parsed as DNS queries; every
/// call increments `queries_received` exactly once, whether or not the backend
/// answers.
pub struct ForwardQueryUseCase {
    forwarder: Arc<dyn DnsForwarder>,
    stats: Arc<StatsRegistry>,
}

impl ForwardQueryUseCase {
    pub fn new(forwarder: Arc<dyn DnsForwarder>, stats: Arc<StatsRegistry>) -> Self {
        Self { forwarder, stats }
    }

    pub async fn execute(&self, query: &[u8]) -> Result<Vec<u8>, DomainError> {
        self.stats.record_query();

        match self.forwarder.forward(query).await {
            Ok(answer) => {
                debug!(
                    backend = %self.forwarder.backend_addr(),
                    query_len = query.len(),
                    answer_len = answer.len(),
                    "Backend answered"
                );
                Ok(answer)
            }
            Err(e) => {
                warn!(
                    backend = %self.forwarder.backend_addr(),
                    error = %e,
                    "Backend query failed"
                );
                Err(e)
            }
        }
    }

    pub fn stats(&self) -> &Arc<StatsRegistry> {
        &self.stats
    }
}
