use ferrous_doh_domain::DomainError;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Send `query` to `server` over TCP with the two-byte length prefix (RFC 1035 §4.2.2).
pub async fn exchange(
    server: SocketAddr,
    query: &[u8],
    timeout: Duration,
) -> Result<Vec<u8>, DomainError> {
    let query_len = u16::try_from(query.len()).map_err(|_| {
        DomainError::Protocol(format!("DNS query too large for TCP: {} bytes", query.len()))
    })?;

    let response = tokio::time::timeout(timeout, send_and_receive(server, query_len, query))
        .await
        .map_err(|_| {
            DomainError::BackendTimeout(format!("No TCP response from {} within {:?}", server, timeout))
        })?
        .map_err(|e| {
            DomainError::BackendUnreachable(format!("TCP exchange with {} failed: {}", server, e))
        })?;

    debug!(
        server = %server,
        bytes_received = response.len(),
        "TCP response received"
    );

    Ok(response)
}

async fn send_and_receive(server: SocketAddr, query_len: u16, query: &[u8]) -> io::Result<Vec<u8>> {
    let mut stream = TcpStream::connect(server).await?;
    stream.set_nodelay(true)?;

    let mut framed = Vec::with_capacity(query.len() + 2);
    framed.extend_from_slice(&query_len.to_be_bytes());
    framed.extend_from_slice(query);
    stream.write_all(&framed).await?;

    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await?;
    let response_len = u16::from_be_bytes(len_buf) as usize;

    let mut response = vec![0u8; response_len];
    stream.read_exact(&mut response).await?;
    Ok(response)
}
