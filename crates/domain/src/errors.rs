use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Bind failed: {0}")]
    Bind(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Backend unreachable: {0}")]
    BackendUnreachable(String),

    #[error("Backend timeout: {0}")]
    BackendTimeout(String),

    #[error("Invalid transport limit: {0}")]
    InvalidLimit(String),

    #[error("Server is not running")]
    NotRunning,
}

impl DomainError {
    /// Backend failures are answered with SERVFAIL instead of dropping the stream.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            DomainError::BackendUnreachable(_) | DomainError::BackendTimeout(_)
        )
    }
}
