//! ASP (Application Server Process) endpoint
//!
//! [`Asp::serve`] connects the association, brings the ASP up
//! (ASPUP, then ASPAC) and pumps inbound frames into the engine until the
//! association goes down. All other methods may be called concurrently from
//! other tasks while `serve` runs.

mod engine;
mod request;

pub use request::RequestKind;

use crate::codec::address::SccpAddress;
use crate::config::XuaConfig;
use crate::errors::{CodecError, Result, TransportError, XuaError};
use crate::messages::{Cldt, DestinationAudit, ErrorMessage, Message};
use crate::transport::{Transport, TransportEvent};
use crate::types::AffectedPointCode;
use bytes::Bytes;
use engine::{Engine, Event};
use metrics::counter;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tracing::{debug, info, instrument, warn};

/// ASP State
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspState {
    Down,
    Inactive,
    Active,
}

impl AspState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Down => "down",
            Self::Inactive => "inactive",
            Self::Active => "active",
        }
    }
}

pub type DataHandler = Box<dyn FnMut(Bytes) + Send>;
pub type StateHandler = Box<dyn FnMut() + Send>;

/// Application callbacks, run on the engine task
#[derive(Default)]
pub struct Handlers {
    pub(crate) on_data: Option<DataHandler>,
    pub(crate) on_up: Option<StateHandler>,
    pub(crate) on_down: Option<StateHandler>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload of every inbound CLDT, and of CLDR carrying data
    pub fn on_data<F>(mut self, f: F) -> Self
    where
        F: FnMut(Bytes) + Send + 'static,
    {
        self.on_data = Some(Box::new(f));
        self
    }

    /// ASP reached Active after bring-up
    pub fn on_up<F>(mut self, f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.on_up = Some(Box::new(f));
        self
    }

    /// Association went down
    pub fn on_down<F>(mut self, f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.on_down = Some(Box::new(f));
        self
    }
}

/// Parts handed to the engine on the first `serve`
struct EngineParts {
    inbox: mpsc::Receiver<Event>,
    state: watch::Sender<AspState>,
}

/// ASP endpoint bound to one association
pub struct Asp {
    config: Arc<XuaConfig>,
    transport: Arc<dyn Transport>,
    events: mpsc::Sender<Event>,
    parts: Mutex<Option<EngineParts>>,
    state: watch::Receiver<AspState>,
    serving: AtomicBool,
    /// Sequence Control for outbound CLDT
    sequence: AtomicU32,
}

impl Asp {
    /// Create a new ASP over `transport`
    pub fn new<T: Transport>(config: XuaConfig, transport: T) -> Result<Self> {
        config.validate()?;

        let (events, inbox) = mpsc::channel(config.asp.event_queue_capacity);
        let (state_tx, state) = watch::channel(AspState::Down);

        Ok(Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
            events,
            parts: Mutex::new(Some(EngineParts {
                inbox,
                state: state_tx,
            })),
            state,
            serving: AtomicBool::new(false),
            sequence: AtomicU32::new(0),
        })
    }

    /// Get current state
    pub fn state(&self) -> AspState {
        *self.state.borrow()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<AspState> {
        self.state.clone()
    }

    pub fn config(&self) -> &XuaConfig {
        &self.config
    }

    /// Connect, bring the ASP up and process traffic until the association
    /// goes down. Returns the bring-up error when ASPUP or ASPAC fails.
    #[instrument(skip(self, handlers))]
    pub async fn serve(&self, handlers: Handlers) -> Result<()> {
        let peer = self.config.remote_addr()?;
        let local = self.config.local_addr()?;

        let parts = self.parts.lock().await.take().ok_or(XuaError::AlreadyServing)?;
        let engine = Engine::new(self.config.clone(), self.transport.clone(), parts.state, handlers);
        let task = tokio::spawn(engine.run(parts.inbox));
        self.serving.store(true, Ordering::SeqCst);

        info!("Serving ASP towards {}", peer);
        let read_result = match self.transport.connect(local, peer).await {
            Ok(()) => self.read_loop().await,
            Err(e) => Err(e.into()),
        };

        let _ = self.events.send(Event::Stop).await;
        let engine_result = task
            .await
            .map_err(|e| XuaError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        self.serving.store(false, Ordering::SeqCst);

        info!("ASP stopped");
        engine_result.and(read_result)
    }

    async fn read_loop(&self) -> Result<()> {
        let limit = self.config.asp.max_decode_failures.max(1);
        let mut failures = 0u32;

        loop {
            let event = match self.transport.recv().await {
                Ok(event) => event,
                Err(e) => {
                    warn!("Receive failed: {}", e);
                    self.enqueue(Event::AssociationDown).await?;
                    return Err(e.into());
                }
            };

            match event {
                TransportEvent::Up => self.enqueue(Event::AssociationUp).await?,
                TransportEvent::Data(frame) => match Message::decode(frame) {
                    Ok(msg) => {
                        failures = 0;
                        debug!("Received {}", msg.name());
                        counter!("xua_frames_received_total", "message" => msg.name()).increment(1);
                        self.enqueue(Event::Received(msg)).await?;
                    }
                    Err(e) => {
                        failures += 1;
                        counter!("xua_decode_errors_total").increment(1);
                        warn!(failures, "Dropping undecodable frame: {}", e);

                        if matches!(
                            e,
                            CodecError::InvalidVersion(_)
                                | CodecError::UnsupportedClass(_)
                                | CodecError::UnsupportedMessage { .. }
                        ) {
                            self.enqueue(Event::Send {
                                message: Message::Error(ErrorMessage::new(e.error_code())),
                                require_active: false,
                                reply: None,
                            })
                            .await?;
                        }

                        if failures >= limit {
                            let reason = format!("{} consecutive undecodable frames", failures);
                            self.transport.abort(&reason).await?;
                            self.enqueue(Event::AssociationDown).await?;
                            return Err(e.into());
                        }
                    }
                },
                TransportEvent::Down | TransportEvent::Lost => {
                    self.enqueue(Event::AssociationDown).await?;
                    return Ok(());
                }
            }
        }
    }

    async fn enqueue(&self, event: Event) -> Result<()> {
        self.events.send(event).await.map_err(|_| XuaError::ConnectionClosed)
    }

    fn ensure_serving(&self) -> Result<()> {
        if self.serving.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::NotConnected.into())
        }
    }

    async fn request(&self, kind: RequestKind) -> Result<()> {
        self.ensure_serving()?;
        let (reply, outcome) = oneshot::channel();
        self.enqueue(Event::Request { kind, reply }).await?;
        outcome.await.map_err(|_| XuaError::ConnectionClosed)?
    }

    async fn send(&self, message: Message, require_active: bool) -> Result<()> {
        let actual = self.state();
        if require_active && actual != AspState::Active {
            return Err(XuaError::InvalidState {
                expected: AspState::Active,
                actual,
            });
        }
        self.ensure_serving()?;

        let (reply, outcome) = oneshot::channel();
        self.enqueue(Event::Send {
            message,
            require_active,
            reply: Some(reply),
        })
        .await?;
        outcome.await.map_err(|_| XuaError::ConnectionClosed)?
    }

    /// Send ASPDN and wait for the acknowledgement
    #[instrument(skip(self))]
    pub async fn asp_down(&self) -> Result<()> {
        info!("Sending ASP DOWN");
        self.request(RequestKind::AspDown).await
    }

    /// Take the ASP down, then shut the association down gracefully.
    /// When another request is still pending nothing is sent and the
    /// association is left open.
    #[instrument(skip(self))]
    pub async fn close(&self) -> Result<()> {
        if !self.serving.load(Ordering::SeqCst) {
            self.transport.close().await?;
            return Ok(());
        }

        let result = self.asp_down().await;
        if let Err(XuaError::RequestPending { pending }) = &result {
            warn!("Close refused, {} pending", pending);
            return result;
        }

        self.transport.close().await?;
        result
    }

    /// Send `payload` as connectionless data
    #[instrument(skip(self, payload), fields(len = payload.len()))]
    pub async fn write(&self, source: SccpAddress, destination: SccpAddress, payload: Bytes) -> Result<()> {
        let cldt = Cldt {
            routing_context: self.config.asp.routing_context.clone(),
            protocol_class: self.config.protocol_class(),
            sequence_control: self.sequence.fetch_add(1, Ordering::Relaxed),
            ..Cldt::new(source, destination, payload)
        };
        self.send_cldt(cldt).await
    }

    /// Send a caller-built CLDT
    pub async fn send_cldt(&self, cldt: Cldt) -> Result<()> {
        cldt.validate()?;
        self.send(Message::Cldt(cldt), true).await
    }

    /// Ask the gateway for the state of the given destinations
    #[instrument(skip(self))]
    pub async fn audit(&self, affected_point_codes: Vec<AffectedPointCode>, ssn: Option<u8>) -> Result<()> {
        let daud = DestinationAudit {
            routing_context: self.config.asp.routing_context.clone(),
            affected_point_codes,
            ssn,
            ..Default::default()
        };
        daud.validate()?;
        self.send(Message::Daud(daud), false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = XuaConfig::default();
        config.asp.event_queue_capacity = 0;
        let (transport, _peer) = MemoryTransport::pair();
        assert!(matches!(Asp::new(config, transport), Err(XuaError::Config(_))));
    }

    #[tokio::test]
    async fn test_write_requires_active() {
        let (transport, _peer) = MemoryTransport::pair();
        let asp = Asp::new(XuaConfig::default(), transport).unwrap();
        assert_eq!(asp.state(), AspState::Down);

        let result = asp
            .write(
                SccpAddress::from_ssn_pc(8, 1),
                SccpAddress::from_ssn_pc(6, 2),
                Bytes::from_static(b"x"),
            )
            .await;
        assert!(matches!(
            result,
            Err(XuaError::InvalidState {
                expected: AspState::Active,
                actual: AspState::Down
            })
        ));
    }

    #[tokio::test]
    async fn test_requests_need_serve() {
        let (transport, _peer) = MemoryTransport::pair();
        let asp = Asp::new(XuaConfig::default(), transport).unwrap();
        assert!(matches!(
            asp.asp_down().await,
            Err(XuaError::Transport(TransportError::NotConnected))
        ));
        tokio_test::assert_ok!(asp.close().await);
    }
}
