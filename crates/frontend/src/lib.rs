//! Ferrous DoH Frontend
//!
//! A blocking handle around [`DohServer`] for callers that do not run their
//! own Tokio runtime: test harnesses, and C/C++ code through [`ffi`].
//! Each [`DohFrontend`] owns a dedicated multi-thread runtime that keeps
//! serving between calls.

pub mod ffi;

use ferrous_doh_domain::{DomainError, ServerConfig, Stats, TransportLimits};
use ferrous_doh_infrastructure::DohServer;
use std::net::SocketAddr;
use tokio::runtime::Runtime;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const RUNTIME_WORKER_THREADS: usize = 2;

/// One DoH frontend instance.
///
/// Methods block the calling thread and must not be called from inside an
/// async context. Dropping the handle stops a running server first.
pub struct DohFrontend {
    server: DohServer,
    runtime: Runtime,
}

impl DohFrontend {
    pub fn new(
        listen_address: &str,
        listen_service: &str,
        backend_address: &str,
        backend_service: &str,
    ) -> Result<Self, DomainError> {
        Self::with_config(&ServerConfig::new(
            listen_address,
            listen_service,
            backend_address,
            backend_service,
        ))
    }

    pub fn with_config(config: &ServerConfig) -> Result<Self, DomainError> {
        let server = DohServer::new(config)?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(RUNTIME_WORKER_THREADS)
            .thread_name("doh-frontend")
            .enable_all()
            .build()
            .map_err(|e| DomainError::Initialization(format!("Tokio runtime: {}", e)))?;

        Ok(Self { server, runtime })
    }

    pub fn set_certificate(&self, pem: &str) {
        self.runtime.block_on(self.server.set_certificate(pem));
    }

    pub fn set_private_key(&self, pem: &str) {
        self.runtime.block_on(self.server.set_private_key(pem));
    }

    pub fn start(&self) -> Result<(), DomainError> {
        self.runtime.block_on(self.server.start())
    }

    pub fn stop(&self) -> Result<(), DomainError> {
        self.runtime.block_on(self.server.stop())
    }

    pub fn is_running(&self) -> bool {
        self.runtime.block_on(self.server.is_running())
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.runtime.block_on(self.server.local_addr())
    }

    pub fn stats(&self) -> Stats {
        self.server.stats()
    }

    pub fn clear_queries(&self) {
        self.server.clear_queries();
    }

    /// Runtime knobs. Each, like [`DohFrontend::block_sending`], fails with
    /// [`DomainError::NotRunning`] before the first successful start.
    pub fn set_max_idle_timeout(&self, ms: u64) -> Result<(), DomainError> {
        self.runtime.block_on(self.server.set_max_idle_timeout(ms))
    }

    pub fn set_max_buffer_size(&self, bytes: u64) -> Result<(), DomainError> {
        self.runtime.block_on(self.server.set_max_buffer_size(bytes))
    }

    pub fn set_max_streams_bidi(&self, streams: u64) -> Result<(), DomainError> {
        self.runtime.block_on(self.server.set_max_streams_bidi(streams))
    }

    pub fn limits(&self) -> TransportLimits {
        self.server.limits()
    }

    pub fn block_sending(&self, blocked: bool) -> Result<(), DomainError> {
        self.server.block_sending(blocked)
    }
}

impl Drop for DohFrontend {
    fn drop(&mut self) {
        match self.runtime.block_on(self.server.stop()) {
            Ok(()) | Err(DomainError::NotRunning) => {}
            Err(e) => warn!(error = %e, "Frontend stop during drop failed"),
        }
    }
}

/// Install a `RUST_LOG`-driven fmt subscriber unless one is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .try_init();
}
