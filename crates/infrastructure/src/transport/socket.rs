//! UDP socket wrapper used by the QUIC endpoint.
//!
//! Every outbound datagram passes through [`FaultInjectingSocket::try_send`],
//! which consults the shared [`SendGate`]. While the gate is closed the
//! datagram is reported as sent and discarded, so the QUIC stack sees plain
//! packet loss and the application layer sees no error.

use quinn::udp::{RecvMeta, Transmit};
use quinn::{AsyncUdpSocket, UdpPoller};
use std::fmt;
use std::io::{self, IoSliceMut};
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::trace;

/// Shared on/off switch for outbound traffic.
#[derive(Debug, Clone, Default)]
pub struct SendGate {
    blocked: Arc<AtomicBool>,
}

impl SendGate {
    pub fn new(blocked: bool) -> Self {
        Self {
            blocked: Arc::new(AtomicBool::new(blocked)),
        }
    }

    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }
}

pub struct FaultInjectingSocket {
    inner: Arc<dyn AsyncUdpSocket>,
    gate: SendGate,
}

impl FaultInjectingSocket {
    pub fn new(inner: Arc<dyn AsyncUdpSocket>, gate: SendGate) -> Self {
        Self { inner, gate }
    }
}

impl fmt::Debug for FaultInjectingSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultInjectingSocket")
            .field("inner", &self.inner)
            .field("blocked", &self.gate.is_blocked())
            .finish()
    }
}

impl AsyncUdpSocket for FaultInjectingSocket {
    fn create_io_poller(self: Arc<Self>) -> Pin<Box<dyn UdpPoller>> {
        Arc::clone(&self.inner).create_io_poller()
    }

    fn try_send(&self, transmit: &Transmit) -> io::Result<()> {
        if self.gate.is_blocked() {
            trace!(
                destination = %transmit.destination,
                bytes = transmit.contents.len(),
                "Outbound datagram dropped"
            );
            return Ok(());
        }
        self.inner.try_send(transmit)
    }

    fn poll_recv(
        &self,
        cx: &mut Context,
        bufs: &mut [IoSliceMut<'_>],
        meta: &mut [RecvMeta],
    ) -> Poll<io::Result<usize>> {
        self.inner.poll_recv(cx, bufs, meta)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    fn max_transmit_segments(&self) -> usize {
        self.inner.max_transmit_segments()
    }

    fn max_receive_segments(&self) -> usize {
        self.inner.max_receive_segments()
    }

    fn may_fragment(&self) -> bool {
        self.inner.may_fragment()
    }
}
