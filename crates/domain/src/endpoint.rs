use crate::DomainError;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

/// Resolve an `(address, service)` pair into a socket address.
///
/// `service` is either a port number or one of the well-known DNS/HTTP service
/// names. `address` may be an IP literal (IPv6 with or without brackets) or a
/// host name; host names take the first address the system resolver returns.
pub fn resolve_endpoint(address: &str, service: &str) -> Result<SocketAddr, DomainError> {
    let port = service_port(service)?;
    let host = address
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']');

    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    (host, port)
        .to_socket_addrs()
        .map_err(|e| {
            DomainError::Initialization(format!("Failed to resolve '{}': {}", address, e))
        })?
        .next()
        .ok_or_else(|| {
            DomainError::Initialization(format!("'{}' resolved to no addresses", address))
        })
}

fn service_port(service: &str) -> Result<u16, DomainError> {
    let service = service.trim();
    if let Ok(port) = service.parse::<u16>() {
        return Ok(port);
    }

    match service.to_ascii_lowercase().as_str() {
        "domain" | "dns" => Ok(53),
        "http" => Ok(80),
        "https" => Ok(443),
        "domain-s" | "dns-over-tls" => Ok(853),
        _ => Err(DomainError::Initialization(format!(
            "Unknown service '{}'",
            service
        ))),
    }
}
