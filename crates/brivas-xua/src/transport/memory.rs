//! In-process association
//!
//! [`MemoryTransport::pair`] returns the engine side and a [`MemoryPeer`]
//! that plays the Signalling Gateway: it observes every frame the engine
//! sends, injects frames and association events, and sees how the
//! association was terminated.

use super::{Transport, TransportEvent};
use crate::errors::{CodecError, TransportError};
use crate::messages::Message;
use async_trait::async_trait;
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, warn};

/// How the engine side terminated the association
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shutdown {
    Open,
    Closed,
    Aborted(String),
}

/// Engine side of an in-process association
pub struct MemoryTransport {
    inbound: Mutex<mpsc::UnboundedReceiver<TransportEvent>>,
    loopback: mpsc::UnboundedSender<TransportEvent>,
    outbound: mpsc::UnboundedSender<Bytes>,
    connected: AtomicBool,
    shutdown: watch::Sender<Shutdown>,
}

/// Gateway side of an in-process association
pub struct MemoryPeer {
    events: mpsc::UnboundedSender<TransportEvent>,
    frames: mpsc::UnboundedReceiver<Bytes>,
    shutdown: watch::Receiver<Shutdown>,
}

impl MemoryTransport {
    pub fn pair() -> (Self, MemoryPeer) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(Shutdown::Open);

        let transport = Self {
            inbound: Mutex::new(events_rx),
            loopback: events_tx.clone(),
            outbound: frames_tx,
            connected: AtomicBool::new(false),
            shutdown: shutdown_tx,
        };
        let peer = MemoryPeer {
            events: events_tx,
            frames: frames_rx,
            shutdown: shutdown_rx,
        };
        (transport, peer)
    }

    fn terminated(&self) -> Option<TransportEvent> {
        match &*self.shutdown.borrow() {
            Shutdown::Open => None,
            Shutdown::Closed => Some(TransportEvent::Down),
            Shutdown::Aborted(_) => Some(TransportEvent::Lost),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, _local: Option<SocketAddr>, peer: SocketAddr) -> Result<(), TransportError> {
        debug!("In-memory association to {}", peer);
        self.connected.store(true, Ordering::SeqCst);
        self.loopback
            .send(TransportEvent::Up)
            .map_err(|_| TransportError::ConnectFailed("peer dropped".to_string()))
    }

    async fn send(&self, frame: Bytes) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        if self.terminated().is_some() {
            return Err(TransportError::Closed);
        }
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::SendFailed("peer dropped".to_string()))
    }

    async fn recv(&self) -> Result<TransportEvent, TransportError> {
        let mut shutdown = self.shutdown.subscribe();
        if let Some(event) = self.terminated() {
            return Ok(event);
        }

        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            _ = shutdown.changed() => Ok(self.terminated().unwrap_or(TransportEvent::Down)),
            event = inbound.recv() => Ok(event.unwrap_or(TransportEvent::Lost)),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.shutdown.send_if_modified(|state| {
            if *state == Shutdown::Open {
                *state = Shutdown::Closed;
                true
            } else {
                false
            }
        });
        Ok(())
    }

    async fn abort(&self, reason: &str) -> Result<(), TransportError> {
        warn!("Aborting in-memory association: {}", reason);
        self.shutdown.send_replace(Shutdown::Aborted(reason.to_string()));
        Ok(())
    }
}

impl MemoryPeer {
    /// Deliver a raw frame to the engine
    pub fn send_frame(&self, frame: Bytes) {
        let _ = self.events.send(TransportEvent::Data(frame));
    }

    pub fn send_message(&self, msg: &Message) {
        self.send_frame(msg.encode());
    }

    /// Signal a graceful association shutdown
    pub fn signal_down(&self) {
        let _ = self.events.send(TransportEvent::Down);
    }

    /// Signal association loss
    pub fn signal_lost(&self) {
        let _ = self.events.send(TransportEvent::Lost);
    }

    /// Next frame sent by the engine
    pub async fn recv_frame(&mut self) -> Option<Bytes> {
        self.frames.recv().await
    }

    /// Next frame sent by the engine, decoded
    pub async fn recv_message(&mut self) -> Option<Result<Message, CodecError>> {
        self.recv_frame().await.map(Message::decode)
    }

    /// Frame already sent by the engine, without waiting
    pub fn try_recv_frame(&mut self) -> Option<Bytes> {
        self.frames.try_recv().ok()
    }

    pub fn shutdown_state(&self) -> Shutdown {
        self.shutdown.borrow().clone()
    }

    /// Wait until the engine closes or aborts the association
    pub async fn terminated(&mut self) -> Shutdown {
        let _ = self
            .shutdown
            .wait_for(|state| *state != Shutdown::Open)
            .await;
        self.shutdown.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::AspStateInfo;
    use std::net::{Ipv4Addr, SocketAddrV4};

    fn addr() -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 14001))
    }

    #[tokio::test]
    async fn test_connect_reports_up_then_frames() {
        let (transport, mut peer) = MemoryTransport::pair();
        transport.connect(None, addr()).await.unwrap();
        assert_eq!(transport.recv().await.unwrap(), TransportEvent::Up);

        peer.send_message(&Message::AspUpAck(AspStateInfo::default()));
        assert!(matches!(transport.recv().await.unwrap(), TransportEvent::Data(_)));

        transport.send(Bytes::from_static(b"frame")).await.unwrap();
        assert_eq!(peer.recv_frame().await, Some(Bytes::from_static(b"frame")));
    }

    #[tokio::test]
    async fn test_abort_is_visible_to_both_sides() {
        let (transport, mut peer) = MemoryTransport::pair();
        transport.connect(None, addr()).await.unwrap();
        let _ = transport.recv().await;

        transport.abort("bring-up failed").await.unwrap();
        assert_eq!(transport.recv().await.unwrap(), TransportEvent::Lost);
        assert_eq!(peer.terminated().await, Shutdown::Aborted("bring-up failed".to_string()));
        assert!(matches!(transport.send(Bytes::new()).await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_close_after_abort_keeps_abort() {
        let (transport, peer) = MemoryTransport::pair();
        transport.abort("x").await.unwrap();
        transport.close().await.unwrap();
        assert_eq!(peer.shutdown_state(), Shutdown::Aborted("x".to_string()));
    }
}
