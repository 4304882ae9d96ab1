//! Global busy indicator.
//!
//! Reference-counted: each holder calls [`BusyIndicator::enable`] once and
//! [`BusyIndicator::disable`] once (or holds a [`BusyGuard`]). The busy flag
//! rises on the first enable. When the last holder releases, the hide is
//! deferred by a grace delay; an enable inside the grace window cancels it,
//! so a burst of short calls shows as one continuous busy period.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use parley_core::constants::SUPPRESSED_KEYS;
use parley_core::{Clock, TimerHandle};
use tokio::sync::watch;
use tracing::debug;

#[derive(Default)]
struct BusyState {
    holders: usize,
    pending_hide: Option<TimerHandle>,
    hide_seq: u64,
}

struct BusyInner {
    clock: Arc<dyn Clock>,
    grace: Duration,
    state: Mutex<BusyState>,
    tx: watch::Sender<bool>,
}

impl BusyInner {
    fn publish(&self, busy: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == busy {
                false
            } else {
                *current = busy;
                true
            }
        });
        if changed {
            if busy {
                debug!("busy indicator shown");
            } else {
                debug!("busy indicator hidden");
            }
        }
    }

    fn hide(&self, seq: u64) {
        let mut state = self.state.lock();
        if state.hide_seq != seq || state.holders > 0 || state.pending_hide.take().is_none() {
            return;
        }
        self.publish(false);
    }
}

/// Shared busy flag with deferred hide.
#[derive(Clone)]
pub struct BusyIndicator {
    inner: Arc<BusyInner>,
}

impl BusyIndicator {
    /// Create an idle indicator.
    pub fn new(clock: Arc<dyn Clock>, grace: Duration) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            inner: Arc::new(BusyInner {
                clock,
                grace,
                state: Mutex::new(BusyState::default()),
                tx,
            }),
        }
    }

    /// Mark busy immediately and cancel any pending hide.
    pub fn enable(&self) {
        let mut state = self.inner.state.lock();
        state.holders += 1;
        if let Some(pending) = state.pending_hide.take() {
            pending.cancel();
        }
        self.inner.publish(true);
    }

    /// Release one hold. The last release schedules the hide after the
    /// grace delay, replacing any pending hide.
    pub fn disable(&self) {
        let mut state = self.inner.state.lock();
        state.holders = state.holders.saturating_sub(1);
        if state.holders > 0 {
            return;
        }
        if let Some(pending) = state.pending_hide.take() {
            pending.cancel();
        }
        state.hide_seq += 1;
        let seq = state.hide_seq;
        let weak: Weak<BusyInner> = Arc::downgrade(&self.inner);
        state.pending_hide = Some(self.inner.clock.schedule(
            self.inner.grace,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.hide(seq);
                }
            }),
        ));
    }

    /// Hold the indicator until the guard is dropped.
    pub fn guard(&self) -> BusyGuard {
        self.enable();
        BusyGuard {
            indicator: self.clone(),
        }
    }

    /// Whether the indicator is shown.
    pub fn is_busy(&self) -> bool {
        *self.inner.tx.borrow()
    }

    /// Observe the flag.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.tx.subscribe()
    }

    /// Whether a key press should be swallowed (submit/activate keys while
    /// busy).
    pub fn suppresses_key(&self, key: &str) -> bool {
        self.is_busy() && SUPPRESSED_KEYS.contains(&key)
    }
}

/// Releases its hold on drop.
pub struct BusyGuard {
    indicator: BusyIndicator,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.indicator.disable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::ManualClock;
    use parley_core::logging::capture_logs;

    fn indicator() -> (BusyIndicator, ManualClock) {
        let clock = ManualClock::new();
        let busy = BusyIndicator::new(Arc::new(clock.clone()), Duration::from_millis(100));
        (busy, clock)
    }

    fn hides(logs: &parley_core::logging::CapturedLogs) -> usize {
        logs.events()
            .iter()
            .filter(|e| e.message == "busy indicator hidden")
            .count()
    }

    #[test]
    fn enable_is_immediate_disable_is_deferred() {
        let (busy, clock) = indicator();
        busy.enable();
        assert!(busy.is_busy());

        busy.disable();
        assert!(busy.is_busy());
        clock.advance(Duration::from_millis(99));
        assert!(busy.is_busy());
        clock.advance(Duration::from_millis(1));
        assert!(!busy.is_busy());
    }

    #[test]
    fn repeated_disables_hide_once() {
        let (logs, _guard) = capture_logs();
        let (busy, clock) = indicator();
        let mut rx = busy.subscribe();

        busy.enable();
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());

        for _ in 0..5 {
            busy.disable();
            clock.advance(Duration::from_millis(10));
        }
        assert!(!rx.has_changed().unwrap());

        clock.advance(Duration::from_millis(500));
        assert!(rx.has_changed().unwrap());
        assert!(!*rx.borrow_and_update());
        assert_eq!(hides(&logs), 1);
    }

    #[test]
    fn burst_coalesces_into_one_busy_period() {
        let (logs, _guard) = capture_logs();
        let (busy, clock) = indicator();

        for _ in 0..4 {
            busy.enable();
            clock.advance(Duration::from_millis(20));
            busy.disable();
            clock.advance(Duration::from_millis(50));
            assert!(busy.is_busy());
        }
        clock.advance(Duration::from_millis(100));
        assert!(!busy.is_busy());
        assert_eq!(hides(&logs), 1);
    }

    #[test]
    fn overlapping_holders() {
        let (busy, clock) = indicator();
        let first = busy.guard();
        let second = busy.guard();
        drop(first);
        clock.advance(Duration::from_secs(1));
        assert!(busy.is_busy());
        drop(second);
        clock.advance(Duration::from_secs(1));
        assert!(!busy.is_busy());
    }

    #[test]
    fn keys_suppressed_only_while_busy() {
        let (busy, clock) = indicator();
        assert!(!busy.suppresses_key("Enter"));
        let guard = busy.guard();
        assert!(busy.suppresses_key("Enter"));
        assert!(busy.suppresses_key("Tab"));
        assert!(!busy.suppresses_key("Escape"));
        drop(guard);
        clock.advance(Duration::from_millis(100));
        assert!(!busy.suppresses_key("Tab"));
    }
}
