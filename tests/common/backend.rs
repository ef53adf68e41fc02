use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;

/// Plain DNS backend answering every UDP query with one A record.
///
/// Each query is answered from its own task after `delay`, so slow answers
/// do not serialize concurrent queries.
pub struct MockBackend {
    addr: SocketAddr,
    queries: Arc<AtomicUsize>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockBackend {
    pub async fn start(delay: Duration) -> std::io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await?);
        let addr = socket.local_addr()?;
        let queries = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let counter = Arc::clone(&queries);
        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    result = socket.recv_from(&mut buf) => {
                        let Ok((len, peer)) = result else { continue };
                        if len < 12 {
                            continue;
                        }
                        counter.fetch_add(1, Ordering::SeqCst);
                        let response = answer(&buf[..len]);
                        let socket = Arc::clone(&socket);
                        tokio::spawn(async move {
                            if !delay.is_zero() {
                                tokio::time::sleep(delay).await;
                            }
                            let _ = socket.send_to(&response, peer).await;
                        });
                    }
                }
            }
        });

        Ok(Self {
            addr,
            queries,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Answer with the query's ID and question, one A record 93.184.216.34, TTL 300.
fn answer(query: &[u8]) -> Vec<u8> {
    let mut response = Vec::with_capacity(query.len() + 16);
    response.extend_from_slice(&query[0..2]);
    response.push(0x81); // QR, RD
    response.push(0x80); // RA, NOERROR
    response.extend_from_slice(&query[4..6]);
    response.extend_from_slice(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x00]);
    response.extend_from_slice(&query[12..]);
    response.extend_from_slice(&[
        0xc0, 0x0c, // pointer to the question name
        0x00, 0x01, // A
        0x00, 0x01, // IN
        0x00, 0x00, 0x01, 0x2c, // TTL 300
        0x00, 0x04, // RDLENGTH
        93, 184, 216, 34,
    ]);
    response
}
