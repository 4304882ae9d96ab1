//! Supervisor behavior driven through a fake transport and a manual clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert_matches::assert_matches;
use parking_lot::Mutex;
use parley_channel::{
    ChannelError, ChannelState, ChannelSupervisor, CloseKind, ConnectRequest, Connector,
    FailureCause, HandlerRegistry, Socket, SocketEvent, SocketEvents, TransportError,
};
use parley_core::logging::capture_logs;
use parley_core::testing::{RecordingNavigator, RecordingNotifier};
use parley_core::{
    AuthExpiry, CredentialStore, Credentials, Envelope, LinkStatus, ManualClock,
    MemoryCredentialStore, OperationType, OutboundFrame, Route,
};
use serde_json::json;

// ── Fake transport ──────────────────────────────────────────────────────────

#[derive(Default)]
struct Wire {
    requests: Vec<ConnectRequest>,
    events: Option<SocketEvents>,
    sent: Vec<String>,
    closed: bool,
    fail_sends: bool,
}

#[derive(Clone, Default)]
struct FakeConnector {
    wire: Arc<Mutex<Wire>>,
}

impl FakeConnector {
    fn emit(&self, event: SocketEvent) {
        let events = self.wire.lock().events.clone().expect("not connected");
        events.emit(event);
    }

    fn sent(&self) -> Vec<String> {
        self.wire.lock().sent.clone()
    }

    fn closed(&self) -> bool {
        self.wire.lock().closed
    }

    fn fail_sends(&self) {
        self.wire.lock().fail_sends = true;
    }
}

struct FakeSocket {
    wire: Arc<Mutex<Wire>>,
}

impl Socket for FakeSocket {
    fn send(&self, text: String) -> Result<(), TransportError> {
        let mut wire = self.wire.lock();
        if wire.fail_sends {
            return Err(TransportError::Send("broken pipe".into()));
        }
        wire.sent.push(text);
        Ok(())
    }

    fn close(&self) {
        self.wire.lock().closed = true;
    }
}

impl Connector for FakeConnector {
    fn connect(
        &self,
        request: ConnectRequest,
        events: SocketEvents,
    ) -> Result<Box<dyn Socket>, TransportError> {
        let mut wire = self.wire.lock();
        wire.requests.push(request);
        wire.events = Some(events);
        Ok(Box::new(FakeSocket {
            wire: self.wire.clone(),
        }))
    }
}

// ── Harness ─────────────────────────────────────────────────────────────────

struct Harness {
    supervisor: ChannelSupervisor,
    connector: FakeConnector,
    clock: ManualClock,
    successes: Arc<AtomicUsize>,
    failures: Arc<Mutex<Vec<FailureCause>>>,
    received: Arc<Mutex<Vec<Envelope>>>,
    store: Arc<MemoryCredentialStore>,
    notifier: Arc<RecordingNotifier>,
    navigator: Arc<RecordingNavigator>,
}

impl Harness {
    fn new() -> Self {
        Self::at("/chat/friend-1")
    }

    fn at(path: &str) -> Self {
        let connector = FakeConnector::default();
        let clock = ManualClock::new();
        let successes = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(Mutex::new(Vec::new()));
        let received = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(MemoryCredentialStore::with(Credentials::new("tok", "user-1")));
        let notifier = Arc::new(RecordingNotifier::default());
        let navigator = Arc::new(RecordingNavigator::at(path));

        let sink = received.clone();
        let registry = HandlerRegistry::new()
            .with(OperationType::Send, move |env: &Envelope| sink.lock().push(env.clone()));

        let on_success = successes.clone();
        let on_failure = failures.clone();
        let supervisor = ChannelSupervisor::builder(Arc::new(connector.clone()), Arc::new(clock.clone()))
            .registry(registry)
            .on_success(move || {
                let _ = on_success.fetch_add(1, Ordering::SeqCst);
            })
            .on_failure(move |cause| on_failure.lock().push(cause.clone()))
            .auth_expiry(AuthExpiry::new(store.clone(), notifier.clone(), navigator.clone()))
            .build();

        Self {
            supervisor,
            connector,
            clock,
            successes,
            failures,
            received,
            store,
            notifier,
            navigator,
        }
    }

    fn open(&self) {
        self.supervisor
            .open("ws://server/chat", Some("secret-token-123".into()))
            .unwrap();
    }

    fn open_and_connect(&self) {
        self.open();
        self.connector.emit(SocketEvent::Opened);
        assert_eq!(self.supervisor.state(), ChannelState::Open);
    }

    fn advance_ms(&self, ms: u64) {
        self.clock.advance(Duration::from_millis(ms));
    }

    fn failures(&self) -> Vec<FailureCause> {
        self.failures.lock().clone()
    }

    fn send_chat(&self) {
        self.supervisor
            .send(&OutboundFrame::Envelope(Envelope::new(
                OperationType::Send,
                json!({"content": "hi"}),
            )))
            .unwrap();
    }
}

fn failed() -> ChannelState {
    ChannelState::Closed(CloseKind::Failure)
}

// ── Scenarios ───────────────────────────────────────────────────────────────

#[test]
fn open_then_socket_opened_reports_success() {
    let h = Harness::new();
    h.open();
    assert_eq!(h.supervisor.state(), ChannelState::Connecting);
    assert_eq!(h.supervisor.link_info().status, LinkStatus::Loading);

    h.advance_ms(800);
    h.connector.emit(SocketEvent::Opened);

    assert_eq!(h.supervisor.state(), ChannelState::Open);
    assert_eq!(h.supervisor.link_info().status, LinkStatus::Success);
    assert_eq!(h.supervisor.link_info().message, "connected");
    assert_eq!(h.successes.load(Ordering::SeqCst), 1);

    // The connect deadline was cancelled.
    h.advance_ms(10_000);
    assert_eq!(h.supervisor.state(), ChannelState::Open);
    assert!(h.failures().is_empty());
}

#[test]
fn no_open_event_within_deadline_fails() {
    let h = Harness::new();
    h.open();

    h.advance_ms(4_999);
    assert_eq!(h.supervisor.state(), ChannelState::Connecting);
    h.advance_ms(1);

    assert_eq!(h.supervisor.state(), failed());
    assert!(h.connector.closed());
    assert_eq!(h.supervisor.link_info().status, LinkStatus::Failure);
    assert_eq!(h.failures(), vec![FailureCause::LivenessTimeout]);

    // Heartbeat loop never started.
    assert_eq!(h.clock.pending(), 0);
    h.advance_ms(120_000);
    assert!(h.connector.sent().is_empty());
    assert_eq!(h.successes.load(Ordering::SeqCst), 0);
}

#[test]
fn unauthorized_envelope_expires_session() {
    let h = Harness::at("/chat/friend-1");
    h.open_and_connect();

    h.connector.emit(SocketEvent::Frame(
        r#"{"status":401,"operationType":"x","data":{"message":"expired"}}"#.into(),
    ));

    assert_eq!(h.supervisor.state(), failed());
    assert!(!h.store.is_logged_in());
    assert_eq!(h.store.token(), None);
    assert_eq!(h.notifier.messages(), vec!["expired"]);
    assert_eq!(
        h.navigator.replaced(),
        vec![Route::Login {
            redirect: Some("/chat/friend-1".into())
        }]
    );
    assert_eq!(
        h.failures(),
        vec![FailureCause::ServerRejected {
            status: 401,
            message: Some("expired".into())
        }]
    );
}

#[test]
fn rejection_without_auth_keeps_credentials() {
    let h = Harness::new();
    h.open_and_connect();
    h.connector.emit(SocketEvent::Frame(
        r#"{"status":500,"operationType":"send","data":null,"message":"db down"}"#.into(),
    ));
    assert_eq!(h.supervisor.state(), failed());
    assert!(h.store.is_logged_in());
    assert_eq!(h.navigator.navigation_count(), 0);
    assert_matches!(&h.failures()[..], [FailureCause::ServerRejected { status: 500, .. }]);
}

#[test]
fn unauthorized_frame_without_data_expires_session() {
    let h = Harness::at("/memo");
    h.open_and_connect();

    h.connector.emit(SocketEvent::Frame(
        r#"{"status":401,"operationType":"x","message":"expired"}"#.into(),
    ));

    assert_eq!(h.supervisor.state(), failed());
    assert!(h.connector.closed());
    assert!(!h.store.is_logged_in());
    assert_eq!(h.notifier.messages(), vec!["expired"]);
    assert_eq!(
        h.navigator.replaced(),
        vec![Route::Login {
            redirect: Some("/memo".into())
        }]
    );
}

#[test]
fn rejection_without_operation_type_fails() {
    let h = Harness::new();
    h.open_and_connect();

    h.connector
        .emit(SocketEvent::Frame(r#"{"status":403,"message":"forbidden"}"#.into()));

    assert_eq!(h.supervisor.state(), failed());
    assert!(h.store.is_logged_in());
    assert_eq!(
        h.failures(),
        vec![FailureCause::ServerRejected {
            status: 403,
            message: Some("forbidden".into())
        }]
    );
}

#[test]
fn ok_frame_with_unknown_operation_only_acknowledges() {
    let h = Harness::new();
    h.open_and_connect();
    h.send_chat();

    h.advance_ms(4_000);
    h.connector.emit(SocketEvent::Frame(
        r#"{"status":200,"operationType":"typing","data":{"friendId":"f1"}}"#.into(),
    ));
    h.advance_ms(4_000);

    assert_eq!(h.supervisor.state(), ChannelState::Open);
    assert!(h.received.lock().is_empty());
    assert!(h.failures().is_empty());
}

#[test]
fn envelope_shaped_heartbeat_is_not_dispatched() {
    let h = Harness::new();
    h.open_and_connect();

    h.connector
        .emit(SocketEvent::Frame(r#"{"status":200,"operationType":"heartbeat"}"#.into()));

    assert_eq!(h.supervisor.state(), ChannelState::Open);
    assert!(h.received.lock().is_empty());
    assert!(h.failures().is_empty());
}

// ── Liveness ────────────────────────────────────────────────────────────────

#[test]
fn inbound_frames_cancel_the_deadline() {
    let h = Harness::new();
    h.open_and_connect();

    h.send_chat();
    h.advance_ms(4_000);
    h.connector.emit(SocketEvent::Frame("heartbeat".into()));
    h.advance_ms(10_000);
    assert_eq!(h.supervisor.state(), ChannelState::Open);

    h.send_chat();
    h.advance_ms(4_000);
    h.connector.emit(SocketEvent::Frame(
        r#"{"status":200,"operationType":"send","data":{"content":"yo"}}"#.into(),
    ));
    h.advance_ms(10_000);
    assert_eq!(h.supervisor.state(), ChannelState::Open);
    assert_eq!(h.received.lock().len(), 1);
}

#[test]
fn send_resets_the_deadline() {
    let h = Harness::new();
    h.open_and_connect();

    h.send_chat();
    h.advance_ms(3_000);
    h.send_chat();
    // Past the first deadline, inside the second.
    h.advance_ms(3_000);
    assert_eq!(h.supervisor.state(), ChannelState::Open);
    h.advance_ms(2_000);

    assert_eq!(h.supervisor.state(), failed());
    assert_eq!(h.failures(), vec![FailureCause::LivenessTimeout]);
}

#[test]
fn heartbeat_cadence_is_measured_from_previous_send() {
    let h = Harness::new();
    h.open_and_connect();

    for beat in 1..=3 {
        h.advance_ms(29_999);
        assert_eq!(h.connector.sent().len(), beat - 1);
        h.advance_ms(1);
        assert_eq!(h.connector.sent().len(), beat);
        assert_eq!(h.connector.sent().last().map(String::as_str), Some("heartbeat"));
        h.connector.emit(SocketEvent::Frame("heartbeat".into()));
    }
    assert_eq!(h.supervisor.state(), ChannelState::Open);
}

#[test]
fn unanswered_heartbeat_fails_the_channel() {
    let h = Harness::new();
    h.open_and_connect();
    h.advance_ms(30_000);
    assert_eq!(h.connector.sent(), vec!["heartbeat"]);
    h.advance_ms(5_000);
    assert_eq!(h.supervisor.state(), failed());
    assert_eq!(h.failures(), vec![FailureCause::LivenessTimeout]);
}

// ── Sending ─────────────────────────────────────────────────────────────────

#[test]
fn send_before_open_is_rejected() {
    let h = Harness::new();
    let result = h.supervisor.send(&OutboundFrame::Heartbeat);
    assert_matches!(result, Err(ChannelError::NotOpen));
    h.open();
    let result = h.supervisor.send(&OutboundFrame::Heartbeat);
    assert_matches!(result, Err(ChannelError::NotOpen));
}

#[test]
fn business_frames_carry_the_full_envelope() {
    let h = Harness::new();
    h.open_and_connect();
    h.send_chat();
    let sent: serde_json::Value = serde_json::from_str(&h.connector.sent()[0]).unwrap();
    assert_eq!(
        sent,
        json!({"status": 200, "operationType": "send", "data": {"content": "hi"}})
    );
}

#[test]
fn transmit_failure_fails_the_channel() {
    let h = Harness::new();
    h.open_and_connect();
    h.connector.fail_sends();

    let result = h.supervisor.send(&OutboundFrame::Heartbeat);

    assert_matches!(result, Err(ChannelError::Transport(TransportError::Send(_))));
    assert_eq!(h.supervisor.state(), failed());
    assert_matches!(&h.failures()[..], [FailureCause::SendFailed(_)]);
    assert_eq!(h.clock.pending(), 0);
}

#[test]
fn open_twice_is_rejected() {
    let h = Harness::new();
    h.open();
    let result = h.supervisor.open("ws://server/chat", None);
    assert_matches!(
        result,
        Err(ChannelError::InvalidState {
            state: ChannelState::Connecting,
            ..
        })
    );
}

#[test]
fn token_is_passed_to_the_transport() {
    let h = Harness::new();
    h.open();
    let requests = h.connector.wire.lock().requests.clone();
    assert_eq!(
        requests,
        vec![ConnectRequest::new("ws://server/chat", Some("secret-token-123".into()))]
    );
}

// ── Teardown and failure idempotence ────────────────────────────────────────

#[test]
fn teardown_closes_socket_and_clears_timers() {
    let h = Harness::new();
    h.open_and_connect();
    h.send_chat();
    assert_eq!(h.clock.pending(), 2);

    h.supervisor.teardown();

    assert_eq!(h.supervisor.state(), ChannelState::Closed(CloseKind::Clean));
    assert!(h.connector.closed());
    assert_eq!(h.clock.pending(), 0);
    h.advance_ms(120_000);
    assert!(h.failures().is_empty());

    // Late socket events after teardown are ignored.
    h.connector.emit(SocketEvent::Error("reset".into()));
    assert_eq!(h.supervisor.state(), ChannelState::Closed(CloseKind::Clean));
    assert!(h.failures().is_empty());
    h.supervisor.teardown();
}

#[test]
fn failure_is_reported_once() {
    let h = Harness::new();
    h.open_and_connect();
    h.connector.emit(SocketEvent::Error("reset".into()));
    h.connector.emit(SocketEvent::Error("reset again".into()));
    h.supervisor.teardown();

    assert_eq!(h.supervisor.state(), failed());
    assert_eq!(h.failures(), vec![FailureCause::SocketError("reset".into())]);
    assert_eq!(h.supervisor.link_info().message, "connection lost, please retry");
}

#[test]
fn callbacks_may_reenter_the_supervisor() {
    let connector = FakeConnector::default();
    let clock = ManualClock::new();
    let slot: Arc<Mutex<Option<ChannelSupervisor>>> = Arc::new(Mutex::new(None));
    let inner = slot.clone();
    let supervisor = ChannelSupervisor::builder(Arc::new(connector.clone()), Arc::new(clock))
        .on_failure(move |_| {
            if let Some(sup) = inner.lock().as_ref() {
                sup.teardown();
            }
        })
        .build();
    *slot.lock() = Some(supervisor.clone());

    supervisor.open("ws://server/chat", None).unwrap();
    connector.emit(SocketEvent::Error("refused".into()));
    assert_eq!(supervisor.state(), failed());
    let _ = slot.lock().take();
}

// ── Inbound ─────────────────────────────────────────────────────────────────

#[test]
fn envelopes_reach_their_handler() {
    let h = Harness::new();
    h.open_and_connect();
    h.connector.emit(SocketEvent::Frame(
        r#"{"status":200,"operationType":"send","data":{"content":"hello"}}"#.into(),
    ));
    h.connector.emit(SocketEvent::Frame(
        r#"{"status":200,"operationType":"append","data":{}}"#.into(),
    ));
    let received = h.received.lock().clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].data["content"], "hello");
}

#[test]
fn malformed_frame_is_logged_and_dropped() {
    let (logs, _guard) = capture_logs();
    let h = Harness::new();
    h.open_and_connect();
    h.send_chat();
    h.connector.emit(SocketEvent::Frame("{not json".into()));

    assert!(logs.has_event(tracing::Level::WARN, "discarding malformed frame"));
    assert_eq!(h.supervisor.state(), ChannelState::Open);
    h.advance_ms(6_000);
    assert_eq!(h.supervisor.state(), ChannelState::Open);
    assert!(!logs.any_field_contains("secret-token-123"));
}
