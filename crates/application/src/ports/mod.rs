pub mod dns_forwarder;

pub use dns_forwarder::DnsForwarder;
