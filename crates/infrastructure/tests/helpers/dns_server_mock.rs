#![allow(dead_code)]
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::oneshot;

/// How the mock backend reacts to a UDP query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// One A record answer
    Answer,
    /// Never reply
    Silent,
    /// Empty answer with TC set; the full answer is only served over TCP
    Truncate,
    /// A reply with the wrong ID first, then the real answer
    WrongIdFirst,
}

/// Plain DNS backend answering on UDP and TCP at the same port.
pub struct MockDnsServer {
    addr: SocketAddr,
    udp_queries: Arc<AtomicUsize>,
    tcp_queries: Arc<AtomicUsize>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockDnsServer {
    pub async fn start(behavior: MockBehavior) -> std::io::Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        let addr = socket.local_addr()?;
        let listener = TcpListener::bind(addr).await?;

        let udp_queries = Arc::new(AtomicUsize::new(0));
        let tcp_queries = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let udp_counter = Arc::clone(&udp_queries);
        let tcp_counter = Arc::clone(&tcp_queries);
        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    result = socket.recv_from(&mut buf) => {
                        let Ok((len, peer)) = result else { continue };
                        udp_counter.fetch_add(1, Ordering::SeqCst);
                        let query = &buf[..len];

                        match behavior {
                            MockBehavior::Silent => {}
                            MockBehavior::Answer => {
                                let _ = socket.send_to(&answer(query), peer).await;
                            }
                            MockBehavior::Truncate => {
                                let _ = socket.send_to(&truncated(query), peer).await;
                            }
                            MockBehavior::WrongIdFirst => {
                                let mut stray = answer(query);
                                stray[0] ^= 0xff;
                                let _ = socket.send_to(&stray, peer).await;
                                let _ = socket.send_to(&answer(query), peer).await;
                            }
                        }
                    }
                    accepted = listener.accept() => {
                        let Ok((mut stream, _)) = accepted else { continue };
                        tcp_counter.fetch_add(1, Ordering::SeqCst);
                        tokio::spawn(async move {
                            let mut len_buf = [0u8; 2];
                            if stream.read_exact(&mut len_buf).await.is_err() {
                                return;
                            }
                            let mut query = vec![0u8; u16::from_be_bytes(len_buf) as usize];
                            if stream.read_exact(&mut query).await.is_err() {
                                return;
                            }
                            let response = answer(&query);
                            let _ = stream.write_all(&(response.len() as u16).to_be_bytes()).await;
                            let _ = stream.write_all(&response).await;
                        });
                    }
                }
            }
        });

        Ok(Self {
            addr,
            udp_queries,
            tcp_queries,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn udp_queries(&self) -> usize {
        self.udp_queries.load(Ordering::SeqCst)
    }

    pub fn tcp_queries(&self) -> usize {
        self.tcp_queries.load(Ordering::SeqCst)
    }
}

impl Drop for MockDnsServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Response header copied from the query with QR, RD and RA set.
fn header(query: &[u8], answers: u16, truncated: bool) -> Vec<u8> {
    let mut response = Vec::with_capacity(512);
    response.extend_from_slice(&query[0..2]);
    response.push(if truncated { 0x83 } else { 0x81 });
    response.push(0x80);
    response.extend_from_slice(&query[4..6]);
    response.extend_from_slice(&answers.to_be_bytes());
    response.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    response
}

fn answer(query: &[u8]) -> Vec<u8> {
    let mut response = header(query, 1, false);
    response.extend_from_slice(&query[12..]);
    response.extend_from_slice(&[
        0xc0, 0x0c, // pointer to the question name
        0x00, 0x01, // A
        0x00, 0x01, // IN
        0x00, 0x00, 0x00, 0x3c, // TTL 60
        0x00, 0x04, // RDLENGTH
        93, 184, 216, 34,
    ]);
    response
}

fn truncated(query: &[u8]) -> Vec<u8> {
    let mut response = header(query, 0, true);
    response.extend_from_slice(&query[12..]);
    response
}
