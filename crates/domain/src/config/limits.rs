use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest DNS message that fits the two-byte length framing.
pub const MAX_DNS_MESSAGE_SIZE: u64 = 65_535;

/// Per-stream flow-control window ceiling.
pub const MAX_STREAM_WINDOW: u64 = 1_000_000;

/// QUIC transport limits advertised to clients.
///
/// All three values can be changed while the server runs. The idle timeout and
/// buffer size are negotiated during the handshake, so a change only reaches
/// connections accepted afterwards. A raised stream cap is also granted to
/// live connections; a lowered one only reaches new connections, because
/// MAX_STREAMS credit cannot be withdrawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TransportLimits {
    /// Idle timeout in milliseconds, `0` disables it
    #[serde(default = "default_max_idle_timeout_ms")]
    pub max_idle_timeout_ms: u64,

    /// Connection receive window in bytes
    #[serde(default = "default_max_buffer_size")]
    pub max_buffer_size: u64,

    /// Concurrent client-initiated bidirectional streams per connection
    #[serde(default = "default_max_streams_bidi")]
    pub max_streams_bidi: u64,
}

impl TransportLimits {
    pub fn idle_timeout(&self) -> Option<Duration> {
        match self.max_idle_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn stream_window(&self) -> u64 {
        self.max_buffer_size.min(MAX_STREAM_WINDOW)
    }

    /// Largest DoH request body accepted on one stream.
    pub fn request_body_limit(&self) -> usize {
        self.max_buffer_size.min(MAX_DNS_MESSAGE_SIZE) as usize
    }
}

impl Default for TransportLimits {
    fn default() -> Self {
        Self {
            max_idle_timeout_ms: default_max_idle_timeout_ms(),
            max_buffer_size: default_max_buffer_size(),
            max_streams_bidi: default_max_streams_bidi(),
        }
    }
}

fn default_max_idle_timeout_ms() -> u64 {
    180_000
}

fn default_max_buffer_size() -> u64 {
    10_000_000
}

fn default_max_streams_bidi() -> u64 {
    100
}
