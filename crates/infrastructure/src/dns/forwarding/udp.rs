use crate::dns::message::{DnsMessage, HEADER_LEN};
use ferrous_doh_domain::DomainError;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// Largest datagram the backend can send back
const MAX_UDP_RESPONSE_SIZE: usize = 65_535;

/// Send `query` to `server` over a fresh connected UDP socket.
///
/// Datagrams whose ID does not match the query are discarded while waiting.
pub async fn exchange(
    server: SocketAddr,
    query: &[u8],
    timeout: Duration,
) -> Result<Vec<u8>, DomainError> {
    // Bind to ephemeral port (0 = OS assigns)
    let bind_addr: SocketAddr = if server.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };

    let socket = UdpSocket::bind(bind_addr).await.map_err(|e| {
        DomainError::BackendUnreachable(format!("Failed to bind UDP socket: {}", e))
    })?;
    socket.connect(server).await.map_err(|e| {
        DomainError::BackendUnreachable(format!("Failed to connect UDP socket to {}: {}", server, e))
    })?;

    let response = tokio::time::timeout(timeout, send_and_receive(&socket, server, query))
        .await
        .map_err(|_| {
            DomainError::BackendTimeout(format!("No UDP response from {} within {:?}", server, timeout))
        })?
        .map_err(|e| {
            DomainError::BackendUnreachable(format!("UDP exchange with {} failed: {}", server, e))
        })?;

    debug!(
        server = %server,
        bytes_received = response.len(),
        "UDP response received"
    );

    Ok(response)
}

async fn send_and_receive(
    socket: &UdpSocket,
    server: SocketAddr,
    query: &[u8],
) -> io::Result<Vec<u8>> {
    let bytes_sent = socket.send(query).await?;
    debug!(server = %server, bytes_sent = bytes_sent, "UDP query sent");

    let expected_id = DnsMessage::id(query);
    let mut recv_buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];

    loop {
        let len = socket.recv(&mut recv_buf).await?;
        let datagram = &recv_buf[..len];

        if len >= HEADER_LEN && DnsMessage::id(datagram) == expected_id {
            recv_buf.truncate(len);
            return Ok(recv_buf);
        }

        warn!(
            server = %server,
            expected_id = ?expected_id,
            received_id = ?DnsMessage::id(datagram),
            len = len,
            "Discarding UDP datagram that does not answer the query"
        );
    }
}
