//! ASP event task
//!
//! The engine is the single owner of the ASP state, the pending request
//! slot and its response deadline. Everything else talks to it through the
//! event queue.

use super::request::RequestKind;
use super::{AspState, Handlers};
use crate::config::XuaConfig;
use crate::errors::{Result, XuaError};
use crate::messages::{ErrorMessage, Heartbeat, Message};
use crate::transport::Transport;
use crate::types::ErrorCode;
use bytes::Bytes;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Input to the event task
pub(crate) enum Event {
    /// Association established, start bring-up
    AssociationUp,
    /// Association shut down or lost
    AssociationDown,
    /// Decoded inbound message
    Received(Message),
    /// Application request expecting an acknowledgement
    Request {
        kind: RequestKind,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Fire-and-forget transmission
    Send {
        message: Message,
        require_active: bool,
        reply: Option<oneshot::Sender<Result<()>>>,
    },
    Stop,
}

/// Who is waiting for a request outcome
enum Origin {
    Caller(oneshot::Sender<Result<()>>),
    BringUp,
}

struct Pending {
    id: u64,
    kind: RequestKind,
    origin: Origin,
    deadline: Instant,
}

/// Work left over after a request completes
enum Followup {
    Issue(RequestKind),
    Abort(String),
}

pub(crate) struct Engine {
    config: Arc<XuaConfig>,
    transport: Arc<dyn Transport>,
    state: watch::Sender<AspState>,
    handlers: Handlers,
    pending: Option<Pending>,
    next_id: u64,
    /// First bring-up failure, returned from `serve`
    failure: Option<XuaError>,
    beat_sequence: u32,
}

impl Engine {
    pub(crate) fn new(
        config: Arc<XuaConfig>,
        transport: Arc<dyn Transport>,
        state: watch::Sender<AspState>,
        handlers: Handlers,
    ) -> Self {
        Self {
            config,
            transport,
            state,
            handlers,
            pending: None,
            next_id: 0,
            failure: None,
            beat_sequence: 0,
        }
    }

    /// Drain the event queue until `Stop` or every sender is gone
    pub(crate) async fn run(mut self, mut events: mpsc::Receiver<Event>) -> Result<()> {
        let period = self.config.tbeat().max(Duration::from_millis(1));
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let beating = self.config.timers.heartbeat;
        let mut was_active = false;

        loop {
            let active = self.current_state() == AspState::Active;
            if active && !was_active {
                heartbeat.reset();
            }
            was_active = active;

            let deadline = self.pending.as_ref().map(|p| (p.id, p.deadline));

            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        if !self.handle(event).await {
                            break;
                        }
                    }
                    None => break,
                },
                id = expire(deadline) => self.on_timeout(id).await,
                _ = heartbeat.tick(), if beating && active => self.send_heartbeat().await,
            }
        }

        if let Some(pending) = self.pending.take() {
            let next = self.complete(pending.kind, pending.origin, Err(XuaError::ConnectionClosed));
            self.settle(next).await;
        }

        debug!("ASP engine stopped");
        match self.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Returns false once the engine should stop
    async fn handle(&mut self, event: Event) -> bool {
        match event {
            Event::AssociationUp => {
                info!("Association up, bringing ASP up");
                let next = self.issue(RequestKind::AspUp, Origin::BringUp).await;
                self.settle(next).await;
            }
            Event::AssociationDown => self.on_association_down(),
            Event::Received(msg) => self.on_message(msg).await,
            Event::Request { kind, reply } => {
                let next = self.issue(kind, Origin::Caller(reply)).await;
                self.settle(next).await;
            }
            Event::Send {
                message,
                require_active,
                reply,
            } => {
                let result = self.send_checked(&message, require_active).await;
                match reply {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            warn!("Failed to send {}: {}", message.name(), e);
                        }
                    }
                }
            }
            Event::Stop => return false,
        }
        true
    }

    fn current_state(&self) -> AspState {
        *self.state.borrow()
    }

    fn set_state(&self, next: AspState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!(from = previous.as_str(), to = next.as_str(), "ASP state changed");
            counter!("xua_state_transitions_total", "to" => next.as_str()).increment(1);
        }
    }

    async fn transmit(&mut self, msg: &Message) -> Result<()> {
        self.transport.send(msg.encode()).await?;
        debug!("Sent {}", msg.name());
        counter!("xua_frames_sent_total", "message" => msg.name()).increment(1);
        Ok(())
    }

    async fn send_checked(&mut self, msg: &Message, require_active: bool) -> Result<()> {
        let actual = self.current_state();
        if require_active && actual != AspState::Active {
            return Err(XuaError::InvalidState {
                expected: AspState::Active,
                actual,
            });
        }
        self.transmit(msg).await
    }

    /// Send a request and arm its deadline
    async fn issue(&mut self, kind: RequestKind, origin: Origin) -> Option<Followup> {
        if let Some(pending) = &self.pending {
            warn!("{} rejected, {} still pending", kind.name(), pending.kind.name());
            let err = XuaError::RequestPending {
                pending: pending.kind.name(),
            };
            return self.complete(kind, origin, Err(err));
        }

        let message = kind.build(&self.config);
        if let Err(e) = self.transmit(&message).await {
            return self.complete(kind, origin, Err(e));
        }

        self.next_id += 1;
        self.pending = Some(Pending {
            id: self.next_id,
            kind,
            origin,
            deadline: Instant::now() + self.config.tack(),
        });
        None
    }

    /// Deliver a request outcome. Bring-up continues or aborts from here.
    fn complete(&mut self, kind: RequestKind, origin: Origin, result: Result<()>) -> Option<Followup> {
        let outcome = match &result {
            Ok(()) => "ok",
            Err(XuaError::Timeout { .. }) => "timeout",
            Err(XuaError::RequestPending { .. }) => "rejected",
            Err(_) => "error",
        };
        counter!("xua_requests_total", "request" => kind.name(), "outcome" => outcome).increment(1);

        if result.is_ok() {
            self.set_state(kind.next_state());
        }

        match origin {
            Origin::Caller(reply) => {
                let _ = reply.send(result);
                None
            }
            Origin::BringUp => match result {
                Ok(()) => match kind {
                    RequestKind::AspUp => Some(Followup::Issue(RequestKind::AspActive)),
                    RequestKind::AspActive => {
                        info!("ASP active");
                        if let Some(on_up) = self.handlers.on_up.as_mut() {
                            on_up();
                        }
                        None
                    }
                    RequestKind::AspDown => None,
                },
                Err(err) => {
                    let reason = format!("{} failed: {}", kind.name(), err);
                    warn!("Bring-up failed: {}", reason);
                    self.failure.get_or_insert(err);
                    self.set_state(AspState::Down);
                    Some(Followup::Abort(reason))
                }
            },
        }
    }

    async fn settle(&mut self, mut next: Option<Followup>) {
        while let Some(step) = next.take() {
            next = match step {
                Followup::Issue(kind) => self.issue(kind, Origin::BringUp).await,
                Followup::Abort(reason) => {
                    if let Err(e) = self.transport.abort(&reason).await {
                        warn!("Abort failed: {}", e);
                    }
                    None
                }
            };
        }
    }

    async fn on_timeout(&mut self, id: u64) {
        let expired = matches!(&self.pending, Some(p) if p.id == id);
        if !expired {
            return;
        }
        let Some(pending) = self.pending.take() else {
            return;
        };

        warn!("{} timed out after {:?}", pending.kind.name(), self.config.tack());
        let err = Message::Error(ErrorMessage::new(ErrorCode::PROTOCOL_ERROR));
        if let Err(e) = self.transmit(&err).await {
            debug!("Could not report timeout to peer: {}", e);
        }

        let next = self.complete(
            pending.kind,
            pending.origin,
            Err(XuaError::Timeout {
                request: pending.kind.name(),
            }),
        );
        self.settle(next).await;
    }

    /// Correlate an acknowledgement or ERR with the pending request
    async fn on_response(&mut self, msg: Message) {
        let Some(pending) = self.pending.take() else {
            match &msg {
                Message::Error(err) => warn!("Peer reported error {}", err.error_code),
                other => debug!("Ignoring unsolicited {}", other.name()),
            }
            return;
        };

        debug!("Received {} for {}", msg.name(), pending.kind.name());
        let result = pending.kind.resolve(&msg);
        let next = self.complete(pending.kind, pending.origin, result);
        self.settle(next).await;
    }

    async fn on_message(&mut self, msg: Message) {
        match msg {
            Message::AspUpAck(_)
            | Message::AspDownAck(_)
            | Message::AspActiveAck(_)
            | Message::AspInactiveAck(_)
            | Message::Error(_) => self.on_response(msg).await,

            Message::Heartbeat(beat) => {
                if let Err(e) = self.transmit(&Message::HeartbeatAck(beat.echo())).await {
                    warn!("Failed to answer BEAT: {}", e);
                }
            }
            Message::HeartbeatAck(beat) => {
                debug!("BEAT Ack ({} bytes)", beat.data.as_ref().map_or(0, |d| d.len()));
            }

            Message::Notify(ntfy) => info!(
                status_type = ntfy.status_type(),
                status_info = ntfy.status_info(),
                "NTFY: {}",
                ntfy.describe()
            ),
            Message::Duna(m) => info!(apc = ?m.affected_point_codes, ssn = ?m.ssn, "DUNA"),
            Message::Dava(m) => info!(apc = ?m.affected_point_codes, ssn = ?m.ssn, "DAVA"),
            Message::Drst(m) => info!(apc = ?m.affected_point_codes, ssn = ?m.ssn, "DRST"),
            Message::Scon(m) => info!(
                apc = ?m.affected_point_codes,
                level = ?m.congestion_level,
                "SCON"
            ),
            Message::Dupu(m) => info!(apc = ?m.affected_point_codes, user_cause = ?m.user_cause, "DUPU"),

            Message::AspUp(_)
            | Message::AspDown(_)
            | Message::AspActive(_)
            | Message::AspInactive(_)
            | Message::Daud(_) => {
                warn!("Unexpected {} from peer", msg.name());
                let err = Message::Error(ErrorMessage::new(ErrorCode::UNEXPECTED_MESSAGE));
                if let Err(e) = self.transmit(&err).await {
                    warn!("Failed to send ERR: {}", e);
                }
            }

            Message::Cldt(cldt) => self.deliver(cldt.data),
            Message::Cldr(cldr) => {
                info!(cause = cldr.cause, "CLDR");
                if let Some(data) = cldr.data {
                    self.deliver(data);
                }
            }
        }
    }

    fn deliver(&mut self, payload: Bytes) {
        match self.handlers.on_data.as_mut() {
            Some(on_data) => on_data(payload),
            None => debug!("No data handler, dropping {} bytes", payload.len()),
        }
    }

    fn on_association_down(&mut self) {
        info!("Association down");
        if let Some(pending) = self.pending.take() {
            match pending.origin {
                Origin::Caller(reply) => {
                    counter!("xua_requests_total", "request" => pending.kind.name(), "outcome" => "closed")
                        .increment(1);
                    let _ = reply.send(Err(XuaError::ConnectionClosed));
                }
                Origin::BringUp => {
                    self.failure.get_or_insert(XuaError::ConnectionClosed);
                }
            }
        }

        self.set_state(AspState::Down);
        if let Some(on_down) = self.handlers.on_down.as_mut() {
            on_down();
        }
    }

    async fn send_heartbeat(&mut self) {
        self.beat_sequence = self.beat_sequence.wrapping_add(1);
        let beat = Heartbeat::new(Bytes::copy_from_slice(&self.beat_sequence.to_be_bytes()));
        if let Err(e) = self.transmit(&Message::Heartbeat(beat)).await {
            warn!("Failed to send BEAT: {}", e);
        }
    }
}

/// Resolve with the request id once its deadline passes
async fn expire(deadline: Option<(u64, Instant)>) -> u64 {
    match deadline {
        Some((id, at)) => {
            sleep_until(at).await;
            id
        }
        None => std::future::pending().await,
    }
}
