//! Connection supervisor: owns one channel session and applies the effects
//! the state machine asks for.
//!
//! Every input (caller request, socket event, timer firing) goes through
//! one locked processing loop. Internal effects (socket, timers, link status) are
//! applied while the session lock is held. Caller-visible callbacks (success,
//! failure, envelope handlers, auth expiry) run after it is released, so they
//! may call back into the supervisor.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use parley_core::codec::{self, OutboundFrame};
use parley_core::constants::{DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_LIVENESS_DEADLINE};
use parley_core::{AuthExpiry, Clock, Envelope, LinkInfo, TimerHandle};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::{ChannelError, FailureCause, TransportError};
use crate::link::LinkMonitor;
use crate::machine::{ChannelEvent, ChannelState, Effect, Transition, transition};
use crate::registry::HandlerRegistry;
use crate::transport::{ConnectRequest, Connector, Socket, SocketEvent, SocketEvents};

/// Called once when the channel opens.
pub type SuccessCallback = Box<dyn Fn() + Send + Sync>;

/// Called once when the channel fails.
pub type FailureCallback = Box<dyn Fn(&FailureCause) + Send + Sync>;

/// Heartbeat and liveness timing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelTiming {
    /// Period between heartbeat sends, measured from the previous send.
    pub heartbeat_interval: Duration,
    /// Window after any send within which a frame must arrive.
    pub liveness_deadline: Duration,
}

impl Default for ChannelTiming {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            liveness_deadline: DEFAULT_LIVENESS_DEADLINE,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for [`ChannelSupervisor`].
pub struct ChannelSupervisorBuilder {
    connector: Arc<dyn Connector>,
    clock: Arc<dyn Clock>,
    registry: HandlerRegistry,
    link: LinkMonitor,
    timing: ChannelTiming,
    on_success: Option<SuccessCallback>,
    on_failure: Option<FailureCallback>,
    auth_expiry: Option<AuthExpiry>,
}

impl ChannelSupervisorBuilder {
    /// Envelope handlers.
    #[must_use]
    pub fn registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Publish link status through an existing monitor.
    #[must_use]
    pub fn link(mut self, link: LinkMonitor) -> Self {
        self.link = link;
        self
    }

    /// Heartbeat and deadline timing.
    #[must_use]
    pub fn timing(mut self, timing: ChannelTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Callback run when the channel opens.
    #[must_use]
    pub fn on_success(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    /// Callback run when the channel fails.
    #[must_use]
    pub fn on_failure(mut self, callback: impl Fn(&FailureCause) + Send + Sync + 'static) -> Self {
        self.on_failure = Some(Box::new(callback));
        self
    }

    /// Action run when the server rejects the session as unauthenticated.
    #[must_use]
    pub fn auth_expiry(mut self, auth_expiry: AuthExpiry) -> Self {
        self.auth_expiry = Some(auth_expiry);
        self
    }

    /// Build the supervisor in the `Idle` state.
    pub fn build(self) -> ChannelSupervisor {
        ChannelSupervisor {
            inner: Arc::new(Inner {
                connector: self.connector,
                clock: self.clock,
                registry: self.registry,
                link: self.link,
                timing: self.timing,
                on_success: self.on_success,
                on_failure: self.on_failure,
                auth_expiry: self.auth_expiry,
                session: Mutex::new(Session::default()),
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Supervisor
// ─────────────────────────────────────────────────────────────────────────────

/// Owns a single real-time channel session.
///
/// Clones share the session. Dropping the last clone closes the socket and
/// cancels both timers.
#[derive(Clone)]
pub struct ChannelSupervisor {
    inner: Arc<Inner>,
}

impl ChannelSupervisor {
    /// Start building a supervisor over a transport and a clock.
    pub fn builder(connector: Arc<dyn Connector>, clock: Arc<dyn Clock>) -> ChannelSupervisorBuilder {
        ChannelSupervisorBuilder {
            connector,
            clock,
            registry: HandlerRegistry::new(),
            link: LinkMonitor::new(),
            timing: ChannelTiming::default(),
            on_success: None,
            on_failure: None,
            auth_expiry: None,
        }
    }

    /// Open the channel. Only allowed once, from `Idle`.
    pub fn open(&self, url: impl Into<String>, auth_token: Option<String>) -> Result<(), ChannelError> {
        self.inner
            .process(None, ChannelEvent::Open(ConnectRequest::new(url, auth_token)))
    }

    /// Send a frame. Only allowed while `Open`.
    ///
    /// A transport error means the channel has already moved to
    /// `Closed(Failure)`.
    pub fn send(&self, frame: &OutboundFrame) -> Result<(), ChannelError> {
        let text = codec::encode(frame)?;
        self.inner.process(None, ChannelEvent::Send(text))
    }

    /// Encode and send a typed envelope.
    pub fn send_envelope<T: Serialize>(&self, envelope: &Envelope<T>) -> Result<(), ChannelError> {
        let text = codec::encode_envelope(envelope)?;
        self.inner.process(None, ChannelEvent::Send(text))
    }

    /// Close the socket and cancel both timers. Never fails.
    pub fn teardown(&self) {
        let _ = self.inner.process(None, ChannelEvent::Teardown);
    }

    /// Current state.
    pub fn state(&self) -> ChannelState {
        self.inner.session.lock().state
    }

    /// Link status publisher.
    pub fn link(&self) -> &LinkMonitor {
        &self.inner.link
    }

    /// Current link status.
    pub fn link_info(&self) -> LinkInfo {
        self.inner.link.current()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session internals
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
enum TimerGuard {
    Deadline(u64),
    Heartbeat(u64),
}

/// Work that must run after the session lock is released.
enum Deferred {
    Success,
    Failure(FailureCause),
    Dispatch(Envelope),
    ExpireAuth(Option<String>),
}

#[derive(Default)]
struct Session {
    state: ChannelState,
    socket: Option<Box<dyn Socket>>,
    deadline: Option<TimerHandle>,
    deadline_seq: u64,
    heartbeat: Option<TimerHandle>,
    heartbeat_seq: u64,
}

impl Session {
    /// Accept a timer firing only if it belongs to the live timer.
    fn claim(&mut self, guard: TimerGuard) -> bool {
        match guard {
            TimerGuard::Deadline(seq) if seq == self.deadline_seq => self.deadline.take().is_some(),
            TimerGuard::Heartbeat(seq) if seq == self.heartbeat_seq => {
                self.heartbeat.take().is_some()
            }
            _ => false,
        }
    }

    fn cancel_deadline(&mut self) {
        if let Some(handle) = self.deadline.take() {
            handle.cancel();
        }
    }

    fn stop_heartbeat(&mut self) {
        if let Some(handle) = self.heartbeat.take() {
            handle.cancel();
        }
    }

    fn close_socket(&mut self) {
        if let Some(socket) = self.socket.take() {
            socket.close();
        }
    }
}

struct Inner {
    connector: Arc<dyn Connector>,
    clock: Arc<dyn Clock>,
    registry: HandlerRegistry,
    link: LinkMonitor,
    timing: ChannelTiming,
    on_success: Option<SuccessCallback>,
    on_failure: Option<FailureCallback>,
    auth_expiry: Option<AuthExpiry>,
    session: Mutex<Session>,
}

impl Inner {
    /// Feed one event through the machine, then run deferred callbacks.
    ///
    /// Only the outcome of the caller's own event is returned; events queued
    /// by effects (e.g. a failed transmit) are handled internally.
    fn process(self: &Arc<Self>, guard: Option<TimerGuard>, event: ChannelEvent) -> Result<(), ChannelError> {
        let mut deferred = Vec::new();
        let outcome = self.run(guard, event, &mut deferred);
        for work in deferred {
            self.run_deferred(work);
        }
        outcome
    }

    fn run(
        self: &Arc<Self>,
        guard: Option<TimerGuard>,
        event: ChannelEvent,
        deferred: &mut Vec<Deferred>,
    ) -> Result<(), ChannelError> {
        let mut session = self.session.lock();
        if let Some(guard) = guard {
            if !session.claim(guard) {
                debug!(?guard, "ignoring stale timer");
                return Ok(());
            }
        }

        let mut outcome = Ok(());
        let mut queue = VecDeque::from([event]);
        let mut first = true;
        while let Some(event) = queue.pop_front() {
            let name = event.name();
            let from = session.state;
            match transition(&from, event) {
                Ok(Transition { next, effects }) => {
                    if next != from {
                        debug!(%from, to = %next, event = name, "channel transition");
                    }
                    session.state = next;
                    for effect in effects {
                        let applied = self.apply(&mut session, effect, &mut queue, deferred);
                        if first {
                            if let Err(e) = applied {
                                outcome = Err(e.into());
                            }
                        }
                    }
                }
                Err(e) if first => outcome = Err(e),
                Err(e) => debug!(error = %e, event = name, "queued event rejected"),
            }
            first = false;
        }
        outcome
    }

    fn apply(
        self: &Arc<Self>,
        session: &mut Session,
        effect: Effect,
        queue: &mut VecDeque<ChannelEvent>,
        deferred: &mut Vec<Deferred>,
    ) -> Result<(), TransportError> {
        match effect {
            Effect::Connect(request) => {
                info!(url = %request.url, "opening channel");
                match self.connector.connect(request, self.socket_events()) {
                    Ok(socket) => session.socket = Some(socket),
                    Err(e) => {
                        warn!(error = %e, "channel connect failed");
                        queue.push_back(ChannelEvent::SocketError(e.to_string()));
                    }
                }
            }
            Effect::StartDeadline => {
                session.cancel_deadline();
                session.deadline_seq += 1;
                let guard = TimerGuard::Deadline(session.deadline_seq);
                session.deadline = Some(self.schedule(
                    self.timing.liveness_deadline,
                    guard,
                    ChannelEvent::DeadlineElapsed,
                ));
            }
            Effect::CancelDeadline => session.cancel_deadline(),
            Effect::ScheduleHeartbeat => {
                session.stop_heartbeat();
                session.heartbeat_seq += 1;
                let guard = TimerGuard::Heartbeat(session.heartbeat_seq);
                session.heartbeat = Some(self.schedule(
                    self.timing.heartbeat_interval,
                    guard,
                    ChannelEvent::HeartbeatDue,
                ));
            }
            Effect::StopHeartbeat => session.stop_heartbeat(),
            Effect::Transmit(text) => {
                let result = match &session.socket {
                    Some(socket) => socket.send(text),
                    None => Err(TransportError::Closed),
                };
                if let Err(e) = result {
                    warn!(error = %e, "transmit failed");
                    queue.push_back(ChannelEvent::SendFailed(e.to_string()));
                    return Err(e);
                }
            }
            Effect::CloseSocket => session.close_socket(),
            Effect::SetLink(info) => self.link.set(info),
            Effect::NotifySuccess => {
                info!("channel open");
                deferred.push(Deferred::Success);
            }
            Effect::NotifyFailure(cause) => {
                warn!(%cause, "channel failed");
                deferred.push(Deferred::Failure(cause));
            }
            Effect::Dispatch(envelope) => deferred.push(Deferred::Dispatch(envelope)),
            Effect::ExpireAuth(message) => deferred.push(Deferred::ExpireAuth(message)),
            Effect::DiscardFrame(reason) => warn!(%reason, "discarding malformed frame"),
        }
        Ok(())
    }

    fn run_deferred(&self, work: Deferred) {
        match work {
            Deferred::Success => {
                if let Some(callback) = &self.on_success {
                    callback();
                }
            }
            Deferred::Failure(cause) => {
                if let Some(callback) = &self.on_failure {
                    callback(&cause);
                }
            }
            Deferred::Dispatch(envelope) => {
                let _ = self.registry.dispatch(&envelope);
            }
            Deferred::ExpireAuth(message) => match &self.auth_expiry {
                Some(auth) => auth.expire(message.as_deref()),
                None => warn!("session rejected as unauthenticated, no auth expiry configured"),
            },
        }
    }

    fn schedule(self: &Arc<Self>, delay: Duration, guard: TimerGuard, event: ChannelEvent) -> TimerHandle {
        let weak = Arc::downgrade(self);
        self.clock.schedule(
            delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let _ = inner.process(Some(guard), event);
                }
            }),
        )
    }

    fn socket_events(self: &Arc<Self>) -> SocketEvents {
        let weak: Weak<Self> = Arc::downgrade(self);
        SocketEvents::new(move |event| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let event = match event {
                SocketEvent::Opened => ChannelEvent::SocketOpened,
                SocketEvent::Error(reason) => ChannelEvent::SocketError(reason),
                SocketEvent::Frame(text) => ChannelEvent::FrameReceived(text),
            };
            let _ = inner.process(None, event);
        })
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let session = self.session.get_mut();
        session.close_socket();
        session.cancel_deadline();
        session.stop_heartbeat();
    }
}
