//! ASP Lifecycle Integration Tests
//!
//! Drives the engine against an in-memory Signalling Gateway

use brivas_xua::codec::encode_frame;
use brivas_xua::messages::{
    AspActive, AspInactive, AspStateInfo, AspUp, Cldt, ErrorMessage, Heartbeat, Notify,
};
use brivas_xua::transport::{MemoryPeer, MemoryTransport, Shutdown};
use brivas_xua::{
    AffectedPointCode, Asp, AspState, CodecError, ErrorCode, Handlers, Message, SccpAddress,
    TrafficModeType, XuaConfig, XuaError,
};
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};

const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    asp: Arc<Asp>,
    peer: MemoryPeer,
    serve: JoinHandle<Result<(), XuaError>>,
    ups: Arc<AtomicUsize>,
    downs: Arc<AtomicUsize>,
    data: mpsc::UnboundedReceiver<Bytes>,
}

fn config() -> XuaConfig {
    let mut config = XuaConfig::default();
    config.asp.routing_context = vec![101];
    config
}

fn start(config: XuaConfig) -> Harness {
    let (transport, peer) = MemoryTransport::pair();
    let asp = Arc::new(Asp::new(config, transport).unwrap());

    let ups = Arc::new(AtomicUsize::new(0));
    let downs = Arc::new(AtomicUsize::new(0));
    let (data_tx, data) = mpsc::unbounded_channel();

    let handlers = Handlers::new()
        .on_data(move |payload| {
            let _ = data_tx.send(payload);
        })
        .on_up({
            let ups = ups.clone();
            move || {
                ups.fetch_add(1, Ordering::SeqCst);
            }
        })
        .on_down({
            let downs = downs.clone();
            move || {
                downs.fetch_add(1, Ordering::SeqCst);
            }
        });

    let serve = tokio::spawn({
        let asp = asp.clone();
        async move { asp.serve(handlers).await }
    });

    Harness {
        asp,
        peer,
        serve,
        ups,
        downs,
        data,
    }
}

async fn expect(peer: &mut MemoryPeer) -> Message {
    timeout(WAIT, peer.recv_message())
        .await
        .expect("no frame from ASP")
        .expect("association closed")
        .expect("undecodable frame")
}

async fn wait_for_state(asp: &Asp, want: AspState) {
    let mut state = asp.subscribe();
    timeout(WAIT, state.wait_for(|s| *s == want))
        .await
        .expect("state not reached")
        .expect("engine gone");
}

async fn finish(serve: JoinHandle<Result<(), XuaError>>) -> Result<(), XuaError> {
    timeout(WAIT, serve).await.expect("serve did not return").unwrap()
}

async fn activate(h: &mut Harness) {
    assert!(matches!(expect(&mut h.peer).await, Message::AspUp(_)));
    h.peer.send_message(&Message::AspUpAck(AspStateInfo::default()));

    match expect(&mut h.peer).await {
        Message::AspActive(aspac) => {
            assert_eq!(aspac.traffic_mode, Some(TrafficModeType::Loadshare));
            assert_eq!(aspac.routing_context, vec![101]);
        }
        other => panic!("expected ASPAC, got {}", other.name()),
    }
    h.peer.send_message(&Message::AspActiveAck(AspActive::default()));
    wait_for_state(&h.asp, AspState::Active).await;
}

#[tokio::test]
async fn test_bring_up_reaches_active() {
    let mut h = start(config());

    assert!(matches!(expect(&mut h.peer).await, Message::AspUp(_)));
    // Management traffic does not resolve the pending ASPUP
    h.peer.send_message(&Message::Notify(Notify {
        status: Notify::AS_INACTIVE,
        ..Default::default()
    }));
    h.peer.send_message(&Message::AspUpAck(AspStateInfo::default()));
    wait_for_state(&h.asp, AspState::Inactive).await;

    assert!(matches!(expect(&mut h.peer).await, Message::AspActive(_)));
    assert_eq!(h.ups.load(Ordering::SeqCst), 0);
    h.peer.send_message(&Message::AspActiveAck(AspActive::default()));
    wait_for_state(&h.asp, AspState::Active).await;

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.ups.load(Ordering::SeqCst), 1);
    assert_eq!(h.asp.state(), AspState::Active);
}

#[tokio::test]
async fn test_write_sends_cldt() {
    let mut h = start(config());
    activate(&mut h).await;

    assert_ok!(
        h.asp
            .write(
                SccpAddress::from_ssn_pc(8, 1),
                SccpAddress::from_ssn_pc(6, 2),
                Bytes::from_static(&[1, 2, 3]),
            )
            .await
    );

    let frame = timeout(WAIT, h.peer.recv_frame()).await.unwrap().unwrap();
    assert_eq!(&frame[..4], &[1, 0, 7, 1]);
    assert_eq!(
        u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]) as usize,
        frame.len()
    );
    assert_eq!(&frame[frame.len() - 8..], &[0x01, 0x0B, 0x00, 0x07, 1, 2, 3, 0]);

    match Message::decode(frame).unwrap() {
        Message::Cldt(cldt) => {
            assert_eq!(cldt.routing_context, vec![101]);
            assert_eq!(cldt.sequence_control, 0);
            assert_eq!(cldt.destination, SccpAddress::from_ssn_pc(6, 2));
        }
        other => panic!("expected CLDT, got {}", other.name()),
    }

    h.asp
        .write(
            SccpAddress::from_ssn_pc(8, 1),
            SccpAddress::from_ssn_pc(6, 2),
            Bytes::from_static(&[4]),
        )
        .await
        .unwrap();
    match expect(&mut h.peer).await {
        Message::Cldt(cldt) => assert_eq!(cldt.sequence_control, 1),
        other => panic!("expected CLDT, got {}", other.name()),
    }
}

#[tokio::test]
async fn test_write_rejects_unroutable_address() {
    let mut h = start(config());
    activate(&mut h).await;

    let result = h
        .asp
        .write(
            SccpAddress {
                subsystem_number: Some(8),
                ..Default::default()
            },
            SccpAddress::from_ssn_pc(6, 2),
            Bytes::from_static(b"x"),
        )
        .await;
    assert!(matches!(result, Err(XuaError::Codec(_))));
    assert!(h.peer.try_recv_frame().is_none());
}

#[tokio::test]
async fn test_peer_error_aborts_bring_up() {
    let mut h = start(config());

    assert!(matches!(expect(&mut h.peer).await, Message::AspUp(_)));
    h.peer
        .send_message(&Message::Error(ErrorMessage::new(ErrorCode::PROTOCOL_ERROR)));

    let result = finish(h.serve).await;
    assert!(matches!(result, Err(XuaError::Peer { code }) if code == ErrorCode::PROTOCOL_ERROR));

    match timeout(WAIT, h.peer.terminated()).await.unwrap() {
        Shutdown::Aborted(reason) => assert!(reason.contains("ASPUP"), "{}", reason),
        other => panic!("expected abort, got {:?}", other),
    }
    assert_eq!(h.asp.state(), AspState::Down);
    assert_eq!(h.ups.load(Ordering::SeqCst), 0);
}

/// Acknowledge ASPUP and consume the ASPAC that follows
async fn await_aspac(h: &mut Harness) {
    assert!(matches!(expect(&mut h.peer).await, Message::AspUp(_)));
    h.peer.send_message(&Message::AspUpAck(AspStateInfo::default()));
    assert!(matches!(expect(&mut h.peer).await, Message::AspActive(_)));
    assert_eq!(h.asp.state(), AspState::Inactive);
}

async fn assert_aborted_at_aspac(mut h: Harness) -> XuaError {
    let err = assert_err!(finish(h.serve).await);
    match timeout(WAIT, h.peer.terminated()).await.unwrap() {
        Shutdown::Aborted(reason) => assert!(reason.contains("ASPAC"), "{}", reason),
        other => panic!("expected abort, got {:?}", other),
    }
    assert_eq!(h.asp.state(), AspState::Down);
    assert_eq!(h.ups.load(Ordering::SeqCst), 0);
    err
}

#[tokio::test]
async fn test_aspac_error_aborts_bring_up() {
    let mut h = start(config());
    await_aspac(&mut h).await;

    h.peer
        .send_message(&Message::Error(ErrorMessage::new(ErrorCode::PROTOCOL_ERROR)));

    let err = assert_aborted_at_aspac(h).await;
    assert!(matches!(err, XuaError::Peer { code } if code == ErrorCode::PROTOCOL_ERROR));
}

#[tokio::test]
async fn test_aspac_timeout_aborts_bring_up() {
    let mut config = config();
    config.timers.tack = 50;
    let mut h = start(config);
    await_aspac(&mut h).await;

    match expect(&mut h.peer).await {
        Message::Error(err) => assert_eq!(err.error_code, ErrorCode::PROTOCOL_ERROR),
        other => panic!("expected ERR, got {}", other.name()),
    }

    let err = assert_aborted_at_aspac(h).await;
    assert!(matches!(err, XuaError::Timeout { request: "ASPAC" }));
}

#[tokio::test]
async fn test_aspac_mismatched_ack_aborts_bring_up() {
    let mut h = start(config());
    await_aspac(&mut h).await;

    h.peer
        .send_message(&Message::AspInactiveAck(AspInactive::default()));

    let err = assert_aborted_at_aspac(h).await;
    assert!(matches!(
        err,
        XuaError::UnexpectedResult {
            request: "ASPAC",
            received: "ASPIA Ack"
        }
    ));
}

#[tokio::test]
async fn test_oversized_write_rejected() {
    let mut h = start(config());
    activate(&mut h).await;

    let result = h
        .asp
        .write(
            SccpAddress::from_ssn_pc(8, 1),
            SccpAddress::from_ssn_pc(6, 2),
            Bytes::from(vec![7u8; 70_000]),
        )
        .await;
    assert!(matches!(
        result,
        Err(XuaError::Codec(CodecError::InvalidParameterLength { tag: 0x010B, .. }))
    ));
    assert!(h.peer.try_recv_frame().is_none());
    assert_eq!(h.asp.state(), AspState::Active);
}

#[tokio::test]
async fn test_second_request_rejected_while_pending() {
    let mut h = start(config());

    // ASPUP stays unanswered
    assert!(matches!(expect(&mut h.peer).await, Message::AspUp(_)));

    let result = h.asp.close().await;
    assert!(matches!(result, Err(XuaError::RequestPending { pending: "ASPUP" })));
    assert!(h.peer.try_recv_frame().is_none());
    assert_eq!(h.peer.shutdown_state(), Shutdown::Open);
}

#[tokio::test]
async fn test_bring_up_timeout() {
    let mut config = config();
    config.timers.tack = 50;
    let mut h = start(config);

    assert!(matches!(expect(&mut h.peer).await, Message::AspUp(_)));
    match expect(&mut h.peer).await {
        Message::Error(err) => assert_eq!(err.error_code, ErrorCode::PROTOCOL_ERROR),
        other => panic!("expected ERR, got {}", other.name()),
    }

    let result = finish(h.serve).await;
    assert!(matches!(result, Err(XuaError::Timeout { request: "ASPUP" })));
    assert!(matches!(h.peer.shutdown_state(), Shutdown::Aborted(_)));
    assert!(h.peer.try_recv_frame().is_none());
}

#[tokio::test]
async fn test_request_timeout_resolves_once() {
    let mut config = config();
    config.timers.tack = 100;
    let mut h = start(config);
    activate(&mut h).await;

    let asp = h.asp.clone();
    let down = tokio::spawn(async move { asp.asp_down().await });

    assert!(matches!(expect(&mut h.peer).await, Message::AspDown(_)));
    match expect(&mut h.peer).await {
        Message::Error(err) => assert_eq!(err.error_code, ErrorCode::PROTOCOL_ERROR),
        other => panic!("expected ERR, got {}", other.name()),
    }

    let result = timeout(WAIT, down).await.unwrap().unwrap();
    assert!(matches!(result, Err(XuaError::Timeout { request: "ASPDN" })));

    // A late acknowledgement finds nothing pending
    h.peer.send_message(&Message::AspDownAck(AspStateInfo::default()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.asp.state(), AspState::Active);
}

#[tokio::test]
async fn test_heartbeat_echo() {
    let mut h = start(config());
    activate(&mut h).await;

    let data = Bytes::from_static(&[0xDE, 0xAD, 0xBE, 0xEF]);
    h.peer
        .send_message(&Message::Heartbeat(Heartbeat::new(data.clone())));

    match expect(&mut h.peer).await {
        Message::HeartbeatAck(ack) => assert_eq!(ack.data, Some(data)),
        other => panic!("expected BEAT Ack, got {}", other.name()),
    }
}

#[tokio::test]
async fn test_periodic_heartbeat_while_active() {
    let mut config = config();
    config.timers.heartbeat = true;
    config.timers.tbeat = 50;
    let mut h = start(config);
    activate(&mut h).await;

    match expect(&mut h.peer).await {
        Message::Heartbeat(beat) => {
            assert_eq!(beat.data, Some(Bytes::from_static(&[0, 0, 0, 1])))
        }
        other => panic!("expected BEAT, got {}", other.name()),
    }
}

#[tokio::test]
async fn test_close_takes_asp_down() {
    let mut h = start(config());
    activate(&mut h).await;

    let asp = h.asp.clone();
    let close = tokio::spawn(async move { asp.close().await });

    assert!(matches!(expect(&mut h.peer).await, Message::AspDown(_)));
    h.peer.send_message(&Message::AspDownAck(AspStateInfo::default()));

    assert_ok!(timeout(WAIT, close).await.unwrap().unwrap());
    assert_eq!(timeout(WAIT, h.peer.terminated()).await.unwrap(), Shutdown::Closed);

    assert_ok!(finish(h.serve).await);
    assert_eq!(h.asp.state(), AspState::Down);
    assert_eq!(h.downs.load(Ordering::SeqCst), 1);

    assert!(matches!(
        h.asp.serve(Handlers::new()).await,
        Err(XuaError::AlreadyServing)
    ));
}

#[tokio::test]
async fn test_association_loss_fails_pending_request() {
    let mut h = start(config());
    activate(&mut h).await;

    let asp = h.asp.clone();
    let down = tokio::spawn(async move { asp.asp_down().await });
    assert!(matches!(expect(&mut h.peer).await, Message::AspDown(_)));

    h.peer.signal_lost();

    let result = timeout(WAIT, down).await.unwrap().unwrap();
    assert!(matches!(result, Err(XuaError::ConnectionClosed)));
    finish(h.serve).await.unwrap();
    assert_eq!(h.asp.state(), AspState::Down);
    assert_eq!(h.downs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_inbound_cldt_reaches_handler() {
    let mut h = start(config());
    activate(&mut h).await;

    h.peer.send_message(&Message::Cldt(Cldt::new(
        SccpAddress::from_ssn_pc(6, 2),
        SccpAddress::from_ssn_pc(8, 1),
        Bytes::from_static(b"tcap"),
    )));

    let payload = timeout(WAIT, h.data.recv()).await.unwrap().unwrap();
    assert_eq!(payload, Bytes::from_static(b"tcap"));
}

#[tokio::test]
async fn test_peer_requests_are_unexpected() {
    let mut h = start(config());
    activate(&mut h).await;

    h.peer.send_message(&Message::AspUp(AspUp::default()));
    match expect(&mut h.peer).await {
        Message::Error(err) => assert_eq!(err.error_code, ErrorCode::UNEXPECTED_MESSAGE),
        other => panic!("expected ERR, got {}", other.name()),
    }
    assert_eq!(h.asp.state(), AspState::Active);
}

#[tokio::test]
async fn test_unsupported_class_answered() {
    let mut h = start(config());
    activate(&mut h).await;

    h.peer.send_frame(encode_frame(1, 1, &[]));
    match expect(&mut h.peer).await {
        Message::Error(err) => assert_eq!(err.error_code, ErrorCode::UNSUPPORTED_MESSAGE_CLASS),
        other => panic!("expected ERR, got {}", other.name()),
    }

    h.peer.send_frame(encode_frame(3, 9, &[]));
    match expect(&mut h.peer).await {
        Message::Error(err) => assert_eq!(err.error_code, ErrorCode::UNSUPPORTED_MESSAGE_TYPE),
        other => panic!("expected ERR, got {}", other.name()),
    }
}

#[tokio::test]
async fn test_repeated_decode_failures_abort() {
    let mut config = config();
    config.asp.max_decode_failures = 3;
    let mut h = start(config);
    activate(&mut h).await;

    // Truncated header: dropped without a reply
    for _ in 0..3 {
        h.peer.send_frame(Bytes::from_static(&[1, 0, 3]));
    }

    let err = assert_err!(finish(h.serve).await);
    assert!(matches!(err, XuaError::Codec(_)));
    assert!(matches!(h.peer.shutdown_state(), Shutdown::Aborted(_)));
}

#[tokio::test]
async fn test_audit_sends_daud() {
    let mut h = start(config());
    activate(&mut h).await;

    h.asp
        .audit(vec![AffectedPointCode::new(2001)], Some(6))
        .await
        .unwrap();

    match expect(&mut h.peer).await {
        Message::Daud(daud) => {
            assert_eq!(daud.routing_context, vec![101]);
            assert_eq!(daud.affected_point_codes, vec![AffectedPointCode::new(2001)]);
            assert_eq!(daud.ssn, Some(6));
        }
        other => panic!("expected DAUD, got {}", other.name()),
    }
}
