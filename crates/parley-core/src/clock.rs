//! Schedulable, cancelable delayed callbacks.
//!
//! Timers used by the channel (liveness deadline, heartbeat) and the busy
//! indicator (hide grace) all go through [`Clock`], so tests can substitute
//! [`ManualClock`] and advance time deterministically.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Callback run when a timer fires.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Timer capability.
pub trait Clock: Send + Sync {
    /// Run `callback` once after `delay` unless the handle is cancelled first.
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;
}

/// Handle to a scheduled timer. Dropping it does not cancel the timer.
#[derive(Clone, Debug, Default)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Cancel the timer. Safe to call repeatedly or after it fired.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TokioClock
// ─────────────────────────────────────────────────────────────────────────────

/// Clock backed by `tokio::time`.
///
/// Outside a tokio runtime nothing can be scheduled: the timer is logged and
/// returned already cancelled, and its callback never runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let handle = TimerHandle::new();
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(error = %e, ?delay, "no tokio runtime, timer not scheduled");
                handle.cancel();
                return handle;
            }
        };
        let token = handle.token.clone();
        drop(runtime.spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(delay) => callback(),
                () = token.cancelled() => {}
            }
        }));
        handle
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ManualClock
// ─────────────────────────────────────────────────────────────────────────────

struct Scheduled {
    due: Duration,
    seq: u64,
    token: CancellationToken,
    callback: TimerCallback,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_seq: u64,
    timers: Vec<Scheduled>,
}

/// Simulated clock. Time only moves when [`advance`](Self::advance) is called.
///
/// Callbacks run on the caller's thread, outside the clock's lock, so they may
/// schedule or cancel further timers.
#[derive(Clone, Default)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    /// Create a clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Elapsed simulated time.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Number of timers that are neither fired nor cancelled.
    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .timers
            .iter()
            .filter(|t| !t.token.is_cancelled())
            .count()
    }

    /// Move time forward by `by`, firing every due timer in due order.
    pub fn advance(&self, by: Duration) {
        let target = self.state.lock().now + by;
        while let Some(callback) = self.pop_due(target) {
            callback();
        }
        self.state.lock().now = target;
    }

    fn pop_due(&self, target: Duration) -> Option<TimerCallback> {
        let mut state = self.state.lock();
        state.timers.retain(|t| !t.token.is_cancelled());
        let index = state
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= target)
            .min_by_key(|(_, t)| (t.due, t.seq))
            .map(|(i, _)| i)?;
        let timer = state.timers.swap_remove(index);
        state.now = timer.due;
        Some(timer.callback)
    }
}

impl Clock for ManualClock {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let handle = TimerHandle::new();
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let due = state.now + delay;
        state.timers.push(Scheduled {
            due,
            seq,
            token: handle.token.clone(),
            callback,
        });
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> TimerCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let make = move || -> TimerCallback {
            let c = c.clone();
            Box::new(move || {
                let _ = c.fetch_add(1, Ordering::SeqCst);
            })
        };
        (count, make)
    }

    #[test]
    fn manual_fires_when_due() {
        let clock = ManualClock::new();
        let (count, make) = counter();
        let _handle = clock.schedule(Duration::from_secs(5), make());

        clock.advance(Duration::from_millis(4999));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        clock.advance(Duration::from_millis(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn manual_cancelled_never_fires() {
        let clock = ManualClock::new();
        let (count, make) = counter();
        let handle = clock.schedule(Duration::from_secs(1), make());
        assert_eq!(clock.pending(), 1);

        handle.cancel();
        assert!(handle.is_cancelled());
        assert_eq!(clock.pending(), 0);
        clock.advance(Duration::from_secs(10));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn manual_fires_in_due_order() {
        let clock = ManualClock::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for (label, secs) in [("c", 3), ("a", 1), ("b", 2)] {
            let order = order.clone();
            let _ = clock.schedule(
                Duration::from_secs(secs),
                Box::new(move || order.lock().push(label)),
            );
        }
        clock.advance(Duration::from_secs(3));
        assert_eq!(*order.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn manual_callback_can_reschedule() {
        let clock = ManualClock::new();
        let (count, make) = counter();
        let inner_clock = clock.clone();
        let inner = make();
        let _ = clock.schedule(
            Duration::from_secs(1),
            Box::new(move || {
                let _ = inner_clock.schedule(Duration::from_secs(1), inner);
            }),
        );

        clock.advance(Duration::from_secs(1));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(clock.pending(), 1);
        clock.advance(Duration::from_secs(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(clock.now(), Duration::from_secs(2));
    }

    #[test]
    fn rescheduled_timer_in_same_advance_fires() {
        let clock = ManualClock::new();
        let (count, make) = counter();
        let inner_clock = clock.clone();
        let inner = make();
        let _ = clock.schedule(
            Duration::from_secs(1),
            Box::new(move || {
                let _ = inner_clock.schedule(Duration::from_secs(1), inner);
            }),
        );
        clock.advance(Duration::from_secs(5));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_fires_after_delay() {
        let (count, make) = counter();
        let _handle = TokioClock.schedule(Duration::from_secs(30), make());

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_cancel() {
        let (count, make) = counter();
        let handle = TokioClock.schedule(Duration::from_secs(5), make());
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn tokio_clock_outside_runtime_returns_cancelled_handle() {
        let (count, make) = counter();
        let handle = TokioClock.schedule(Duration::from_millis(1), make());
        assert!(handle.is_cancelled());
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
