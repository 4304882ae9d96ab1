//! Connection state machine.
//!
//! [`transition`] is pure: it maps the current [`ChannelState`] and an
//! incoming [`ChannelEvent`] to the next state plus the ordered list of
//! [`Effect`]s the supervisor must carry out. It performs no I/O and owns no
//! timers, so every rule can be exercised directly.
//!
//! ```text
//! Idle ──open──▶ Connecting ──opened──▶ Open
//!                    │                   │
//!                    └──── error / deadline / rejection ───▶ Closed(Failure)
//!   (any) ──teardown──▶ Closed(Clean)
//! ```

use std::fmt;

use parley_core::codec::{self, InboundFrame};
use parley_core::constants::{HEARTBEAT_SENTINEL, LINK_CONNECTED, LINK_CONNECTING, LINK_LOST};
use parley_core::{Envelope, LinkInfo, LinkStatus};

use crate::errors::{ChannelError, FailureCause};
use crate::transport::ConnectRequest;

/// How a closed channel ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseKind {
    /// Link lost, liveness timeout or server rejection.
    Failure,
    /// Explicit teardown.
    Clean,
}

/// Lifecycle state of a channel session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChannelState {
    /// Created, not yet opened.
    #[default]
    Idle,
    /// Waiting for the socket to open.
    Connecting,
    /// Open and exchanging frames.
    Open,
    /// Terminal.
    Closed(CloseKind),
}

impl ChannelState {
    /// Whether frames may be sent.
    pub fn is_open(self) -> bool {
        self == Self::Open
    }

    /// Whether the session has ended.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Connecting => f.write_str("connecting"),
            Self::Open => f.write_str("open"),
            Self::Closed(CloseKind::Failure) => f.write_str("closed (failure)"),
            Self::Closed(CloseKind::Clean) => f.write_str("closed"),
        }
    }
}

/// Input to the state machine.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelEvent {
    /// Caller asked to open the channel.
    Open(ConnectRequest),
    /// The socket handshake completed.
    SocketOpened,
    /// The socket failed.
    SocketError(String),
    /// A raw text frame arrived.
    FrameReceived(String),
    /// Caller asked to send an encoded frame.
    Send(String),
    /// The socket refused a frame.
    SendFailed(String),
    /// The liveness deadline fired.
    DeadlineElapsed,
    /// The heartbeat interval fired.
    HeartbeatDue,
    /// Caller asked to tear the channel down.
    Teardown,
}

impl ChannelEvent {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open(_) => "open",
            Self::SocketOpened => "socket_opened",
            Self::SocketError(_) => "socket_error",
            Self::FrameReceived(_) => "frame_received",
            Self::Send(_) => "send",
            Self::SendFailed(_) => "send_failed",
            Self::DeadlineElapsed => "deadline_elapsed",
            Self::HeartbeatDue => "heartbeat_due",
            Self::Teardown => "teardown",
        }
    }
}

/// Side effect requested by a transition, applied in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Create the socket.
    Connect(ConnectRequest),
    /// (Re)start the liveness deadline, replacing any pending one.
    StartDeadline,
    /// Cancel the pending liveness deadline.
    CancelDeadline,
    /// (Re)schedule the next heartbeat, replacing any pending one.
    ScheduleHeartbeat,
    /// Cancel the pending heartbeat.
    StopHeartbeat,
    /// Hand a text frame to the socket.
    Transmit(String),
    /// Close the socket and drop it.
    CloseSocket,
    /// Publish a new link status.
    SetLink(LinkInfo),
    /// Run the success callback.
    NotifySuccess,
    /// Run the failure callback.
    NotifyFailure(FailureCause),
    /// Deliver a business envelope to its handler.
    Dispatch(Envelope),
    /// Clear credentials and redirect to login.
    ExpireAuth(Option<String>),
    /// Drop an inbound frame that could not be decoded.
    DiscardFrame(String),
}

/// Result of a transition.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// State after the event.
    pub next: ChannelState,
    /// Effects to apply, in order.
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: ChannelState, effects: Vec<Effect>) -> Self {
        Self { next, effects }
    }

    fn stay(state: ChannelState) -> Self {
        Self::to(state, Vec::new())
    }
}

/// Compute the next state and effects.
///
/// Returns an error only for caller-driven events (`Open`, `Send`) that are
/// not allowed in `state`. Socket and timer events that arrive in a state
/// where they have no meaning are ignored.
pub fn transition(state: &ChannelState, event: ChannelEvent) -> Result<Transition, ChannelError> {
    use ChannelEvent as E;
    use ChannelState as S;

    let state = *state;
    let result = match (state, event) {
        (S::Idle, E::Open(request)) => Transition::to(
            S::Connecting,
            vec![
                Effect::SetLink(LinkInfo::new(LinkStatus::Loading, LINK_CONNECTING)),
                Effect::StartDeadline,
                Effect::Connect(request),
            ],
        ),
        (_, E::Open(_)) => {
            return Err(ChannelError::InvalidState {
                state,
                action: "open",
            });
        }

        (S::Connecting, E::SocketOpened) => Transition::to(
            S::Open,
            vec![
                Effect::CancelDeadline,
                Effect::SetLink(LinkInfo::new(LinkStatus::Success, LINK_CONNECTED)),
                Effect::ScheduleHeartbeat,
                Effect::NotifySuccess,
            ],
        ),

        (S::Connecting | S::Open, E::SocketError(reason)) => fail(FailureCause::SocketError(reason)),
        (S::Connecting | S::Open, E::DeadlineElapsed) => fail(FailureCause::LivenessTimeout),
        (S::Open, E::SendFailed(reason)) => fail(FailureCause::SendFailed(reason)),

        (S::Open, E::Send(text)) => Transition::to(
            S::Open,
            vec![Effect::StartDeadline, Effect::Transmit(text)],
        ),
        (_, E::Send(_)) => return Err(ChannelError::NotOpen),

        (S::Open, E::FrameReceived(raw)) => receive(&raw),

        (S::Open, E::HeartbeatDue) => Transition::to(
            S::Open,
            vec![
                Effect::StartDeadline,
                Effect::Transmit(HEARTBEAT_SENTINEL.to_owned()),
                Effect::ScheduleHeartbeat,
            ],
        ),

        (S::Closed(kind), E::Teardown) => Transition::to(S::Closed(kind), cleanup()),
        (_, E::Teardown) => Transition::to(S::Closed(CloseKind::Clean), cleanup()),

        // A failure after the session already ended only re-runs cleanup.
        (S::Closed(_), E::SocketError(_) | E::DeadlineElapsed | E::SendFailed(_)) => {
            Transition::to(state, cleanup())
        }

        (state, _) => Transition::stay(state),
    };
    Ok(result)
}

fn cleanup() -> Vec<Effect> {
    vec![
        Effect::CloseSocket,
        Effect::CancelDeadline,
        Effect::StopHeartbeat,
    ]
}

fn fail(cause: FailureCause) -> Transition {
    let mut effects = cleanup();
    effects.push(Effect::SetLink(LinkInfo::new(LinkStatus::Failure, LINK_LOST)));
    let expire = match &cause {
        FailureCause::ServerRejected { message, .. } if cause.is_auth() => Some(message.clone()),
        _ => None,
    };
    effects.push(Effect::NotifyFailure(cause));
    if let Some(message) = expire {
        effects.push(Effect::ExpireAuth(message));
    }
    Transition::to(ChannelState::Closed(CloseKind::Failure), effects)
}

/// Any inbound frame counts as a liveness acknowledgment.
fn receive(raw: &str) -> Transition {
    let mut effects = vec![Effect::CancelDeadline];
    match codec::decode(raw) {
        Ok(InboundFrame::Heartbeat) => {}
        Ok(InboundFrame::Envelope(envelope)) if envelope.is_ok() => {
            effects.push(Effect::Dispatch(envelope));
        }
        Ok(InboundFrame::Envelope(envelope)) => {
            let mut failed = fail(FailureCause::ServerRejected {
                status: envelope.status,
                message: envelope.server_message(),
            });
            effects.append(&mut failed.effects);
            return Transition::to(failed.next, effects);
        }
        Err(e) => effects.push(Effect::DiscardFrame(e.to_string())),
    }
    Transition::to(ChannelState::Open, effects)
}
