//! Ferrous DoH Infrastructure Layer
//!
//! - `dns`: wire-format helpers and the plain-DNS backend forwarder
//! - `transport`: TLS identity, QUIC endpoint configuration, fault-injecting socket
//! - `doh`: RFC 8484 request handling over HTTP/3
//! - `server`: the `DohServer` lifecycle controller

pub mod dns;
pub mod doh;
pub mod server;
pub mod transport;

pub use dns::forwarding::BackendForwarder;
pub use server::DohServer;
