//! Framed TCP association
//!
//! Frame format: `[4-byte length][2-byte stream id][4-byte PPID][data]`,
//! where length counts the stream id, PPID and data.

use super::{Transport, TransportEvent};
use crate::config::TransportConfig;
use crate::errors::TransportError;
use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpSocket, TcpStream};
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

/// Stream id + PPID
const FRAME_HEADER_LEN: usize = 6;

/// Largest frame accepted from the peer
const MAX_FRAME_LEN: usize = 65536;

/// Association State
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationState {
    Closed,
    Established,
    ShutdownPending,
    Aborted,
}

/// TCP association carrying xUA frames
pub struct TcpTransport {
    config: TransportConfig,
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    state: RwLock<AssociationState>,
    /// `Up` not yet reported through `recv`
    up_pending: AtomicBool,
    /// Set on close/abort to release a blocked reader
    shutdown: watch::Sender<Option<TransportEvent>>,
}

impl TcpTransport {
    pub fn new(config: TransportConfig) -> Self {
        let (shutdown, _) = watch::channel(None);
        Self {
            config,
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            state: RwLock::new(AssociationState::Closed),
            up_pending: AtomicBool::new(false),
            shutdown,
        }
    }

    /// Wrap an accepted stream (server side)
    pub fn from_stream(stream: TcpStream, config: TransportConfig) -> Self {
        let (reader, writer) = stream.into_split();
        let (shutdown, _) = watch::channel(None);
        Self {
            config,
            reader: Mutex::new(Some(reader)),
            writer: Mutex::new(Some(writer)),
            state: RwLock::new(AssociationState::Established),
            up_pending: AtomicBool::new(true),
            shutdown,
        }
    }

    /// Get current state
    pub async fn state(&self) -> AssociationState {
        *self.state.read().await
    }

    async fn read_frame(reader: &mut OwnedReadHalf) -> std::io::Result<Option<Bytes>> {
        loop {
            let frame_len = match reader.read_u32().await {
                Ok(len) => len as usize,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
                Err(e) => return Err(e),
            };

            // Zero-length frames are keepalives
            if frame_len == 0 {
                continue;
            }
            if !(FRAME_HEADER_LEN..=MAX_FRAME_LEN).contains(&frame_len) {
                return Err(std::io::Error::new(
                    ErrorKind::InvalidData,
                    format!("invalid frame length {}", frame_len),
                ));
            }

            let mut buf = vec![0u8; frame_len];
            reader.read_exact(&mut buf).await?;

            let mut frame = Bytes::from(buf);
            let stream_id = frame.get_u16();
            let _ppid = frame.get_u32();
            debug!("Received {} bytes on stream {}", frame.len(), stream_id);
            return Ok(Some(frame));
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    #[instrument(skip(self), fields(remote = %peer))]
    async fn connect(&self, local: Option<SocketAddr>, peer: SocketAddr) -> Result<(), TransportError> {
        info!("Connecting association to {}", peer);

        let socket = if peer.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        if let Some(local) = local {
            socket.bind(local)?;
        }

        let stream = socket.connect(peer).await.map_err(|e| {
            error!("Failed to connect: {}", e);
            TransportError::ConnectFailed(e.to_string())
        })?;
        stream.set_nodelay(true)?;

        let actual_local = stream.local_addr()?;
        info!("Association established: {} -> {}", actual_local, peer);

        let (reader, writer) = stream.into_split();
        *self.reader.lock().await = Some(reader);
        *self.writer.lock().await = Some(writer);
        *self.state.write().await = AssociationState::Established;
        self.shutdown.send_replace(None);
        self.up_pending.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, frame: Bytes) -> Result<(), TransportError> {
        let mut buf = BytesMut::with_capacity(4 + FRAME_HEADER_LEN + frame.len());
        buf.put_u32((FRAME_HEADER_LEN + frame.len()) as u32);
        buf.put_u16(self.config.stream_id);
        buf.put_u32(self.config.ppid);
        buf.put_slice(&frame);

        let mut writer = self.writer.lock().await;
        let stream = writer.as_mut().ok_or(TransportError::NotConnected)?;
        stream.write_all(&buf).await.map_err(|e| {
            error!("Send failed: {}", e);
            TransportError::SendFailed(e.to_string())
        })?;

        debug!("Sent {} bytes on stream {}", frame.len(), self.config.stream_id);
        Ok(())
    }

    async fn recv(&self) -> Result<TransportEvent, TransportError> {
        if self.up_pending.swap(false, Ordering::SeqCst) {
            return Ok(TransportEvent::Up);
        }

        let mut shutdown = self.shutdown.subscribe();
        if let Some(event) = shutdown.borrow_and_update().clone() {
            return Ok(event);
        }

        let mut reader = self.reader.lock().await;
        let Some(stream) = reader.as_mut() else {
            // Taken by a concurrent abort
            return shutdown.borrow().clone().ok_or(TransportError::NotConnected);
        };

        tokio::select! {
            _ = shutdown.changed() => {
                Ok(shutdown.borrow().clone().unwrap_or(TransportEvent::Down))
            }
            frame = Self::read_frame(stream) => match frame {
                Ok(Some(frame)) => Ok(TransportEvent::Data(frame)),
                Ok(None) => {
                    info!("Association closed by peer");
                    *self.state.write().await = AssociationState::Closed;
                    Ok(TransportEvent::Down)
                }
                Err(e) => {
                    warn!("Association lost: {}", e);
                    *self.state.write().await = AssociationState::Aborted;
                    Ok(TransportEvent::Lost)
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn close(&self) -> Result<(), TransportError> {
        info!("Closing association");
        *self.state.write().await = AssociationState::ShutdownPending;

        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.shutdown().await?;
        }

        *self.state.write().await = AssociationState::Closed;
        self.shutdown.send_replace(Some(TransportEvent::Down));
        info!("Association closed");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn abort(&self, reason: &str) -> Result<(), TransportError> {
        warn!("Aborting association: {}", reason);
        *self.state.write().await = AssociationState::Aborted;

        // Release a blocked reader before taking its half
        self.shutdown.send_replace(Some(TransportEvent::Lost));
        let writer = self.writer.lock().await.take();
        let reader = self.reader.lock().await.take();

        // Zero linger turns the close into a RST
        if let (Some(reader), Some(writer)) = (reader, writer) {
            match reader.reunite(writer) {
                Ok(stream) => {
                    if let Err(e) = stream.set_linger(Some(Duration::ZERO)) {
                        debug!("Could not clear linger: {}", e);
                    }
                }
                Err(e) => debug!("Could not reunite halves: {}", e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_framing_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = TcpTransport::new(TransportConfig::default());
        client.connect(None, addr).await.unwrap();
        let (stream, _) = listener.accept().await.unwrap();
        let server = TcpTransport::from_stream(stream, TransportConfig::default());

        assert_eq!(client.recv().await.unwrap(), TransportEvent::Up);
        assert_eq!(server.recv().await.unwrap(), TransportEvent::Up);

        client.send(Bytes::from_static(&[1, 0, 3, 1, 0, 0, 0, 8])).await.unwrap();
        assert_eq!(
            server.recv().await.unwrap(),
            TransportEvent::Data(Bytes::from_static(&[1, 0, 3, 1, 0, 0, 0, 8]))
        );

        client.close().await.unwrap();
        assert_eq!(server.recv().await.unwrap(), TransportEvent::Down);
        assert_eq!(client.recv().await.unwrap(), TransportEvent::Down);
        assert_eq!(client.state().await, AssociationState::Closed);
    }

    #[tokio::test]
    async fn test_abort_releases_reader() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = std::sync::Arc::new(TcpTransport::new(TransportConfig::default()));
        client.connect(None, addr).await.unwrap();
        let (stream, _) = listener.accept().await.unwrap();
        let server = TcpTransport::from_stream(stream, TransportConfig::default());
        assert_eq!(client.recv().await.unwrap(), TransportEvent::Up);
        assert_eq!(server.recv().await.unwrap(), TransportEvent::Up);

        let reader = {
            let client = client.clone();
            tokio::spawn(async move { client.recv().await })
        };
        tokio::task::yield_now().await;
        client.abort("test").await.unwrap();

        assert_eq!(reader.await.unwrap().unwrap(), TransportEvent::Lost);
        assert_eq!(client.state().await, AssociationState::Aborted);

        // The peer sees a reset, not an orderly shutdown
        assert_eq!(server.recv().await.unwrap(), TransportEvent::Lost);
        assert_eq!(server.state().await, AssociationState::Aborted);
    }

    #[tokio::test]
    async fn test_send_before_connect() {
        let transport = TcpTransport::new(TransportConfig::default());
        assert!(matches!(
            transport.send(Bytes::from_static(b"x")).await,
            Err(TransportError::NotConnected)
        ));
    }
}
