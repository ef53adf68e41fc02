pub mod quic;
pub mod socket;
pub mod tls;

pub use quic::{bind_endpoint, build_server_config, build_transport_config, BoundEndpoint};
pub use socket::{FaultInjectingSocket, SendGate};
pub use tls::build_quic_crypto;
