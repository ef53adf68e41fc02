use ferrous_doh_domain::Stats;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Connection and query counters shared by every connection task.
///
/// All counters sit behind one short-held lock so a snapshot never mixes
/// values from before and after a concurrent update.
#[derive(Debug, Default)]
pub struct StatsRegistry {
    counters: Mutex<Stats>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_query(&self) {
        self.lock().queries_received += 1;
    }

    /// Called once per connection that finished its handshake.
    pub fn record_connection_accepted(&self) {
        let mut counters = self.lock();
        counters.connections_accepted += 1;
        counters.alive_connections += 1;
    }

    pub fn record_connection_closed(&self) {
        let mut counters = self.lock();
        counters.alive_connections = counters.alive_connections.saturating_sub(1);
    }

    /// Reset `queries_received` only.
    pub fn clear_queries(&self) {
        self.lock().queries_received = 0;
    }

    pub fn snapshot(&self) -> Stats {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, Stats> {
        // Counters stay meaningful even if a holder panicked mid-increment.
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
