//! Association transport boundary
//!
//! The engine needs a reliable, message-oriented duplex channel with an
//! asynchronous association up/down signal. SCTP provides this natively;
//! [`TcpTransport`] frames messages over TCP for environments without kernel
//! SCTP, and [`MemoryTransport`] joins the engine to an in-process peer.

mod memory;
mod tcp;

pub use memory::{MemoryPeer, MemoryTransport, Shutdown};
pub use tcp::{AssociationState, TcpTransport};

use crate::errors::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use std::net::SocketAddr;

/// Event delivered by [`Transport::recv`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Association established
    Up,
    /// One complete xUA frame
    Data(Bytes),
    /// Association shut down gracefully
    Down,
    /// Association lost or aborted
    Lost,
}

/// Message-oriented association used by the ASP engine
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Establish the association. `Up` is reported through [`Transport::recv`].
    async fn connect(&self, local: Option<SocketAddr>, peer: SocketAddr) -> Result<(), TransportError>;

    /// Send one complete frame
    async fn send(&self, frame: Bytes) -> Result<(), TransportError>;

    /// Wait for the next association event or frame
    async fn recv(&self) -> Result<TransportEvent, TransportError>;

    /// Graceful shutdown
    async fn close(&self) -> Result<(), TransportError>;

    /// Immediate teardown
    async fn abort(&self, reason: &str) -> Result<(), TransportError>;
}
