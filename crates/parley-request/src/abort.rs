//! Abort epochs via `CancellationToken`.
//!
//! Exactly one epoch is live. Calls that participate in abort capture the
//! live epoch's token when they are issued. [`AbortCoordinator::abort`]
//! cancels that token and installs a fresh epoch, so calls issued afterwards
//! are unaffected.

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One abort generation.
#[derive(Clone, Debug)]
pub struct AbortEpoch {
    id: u64,
    token: CancellationToken,
}

impl AbortEpoch {
    fn new(id: u64) -> Self {
        Self {
            id,
            token: CancellationToken::new(),
        }
    }

    /// Generation number. Strictly increasing.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Token cancelled when this epoch is aborted.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Whether this epoch has been aborted.
    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Owns the live epoch.
#[derive(Debug)]
pub struct AbortCoordinator {
    current: Mutex<AbortEpoch>,
}

impl AbortCoordinator {
    /// Create a coordinator at epoch 0.
    pub fn new() -> Self {
        Self {
            current: Mutex::new(AbortEpoch::new(0)),
        }
    }

    /// The live epoch.
    pub fn current(&self) -> AbortEpoch {
        self.current.lock().clone()
    }

    /// Cancel every call under the live epoch and install the next one.
    /// Returns the new epoch's id.
    pub fn abort(&self) -> u64 {
        let mut current = self.current.lock();
        current.token.cancel();
        let next = AbortEpoch::new(current.id + 1);
        debug!(aborted = current.id, live = next.id, "abort epoch advanced");
        *current = next;
        current.id
    }

    /// Abort only if `epoch` is still the live epoch.
    ///
    /// A late failure from an already-aborted epoch must not cancel calls
    /// issued after that abort.
    pub fn abort_if_current(&self, epoch: u64) -> bool {
        let mut current = self.current.lock();
        if current.id != epoch {
            debug!(stale = epoch, live = current.id, "abort skipped, epoch already replaced");
            return false;
        }
        current.token.cancel();
        *current = AbortEpoch::new(epoch + 1);
        debug!(aborted = epoch, live = epoch + 1, "abort epoch advanced");
        true
    }
}

impl Default for AbortCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_live() {
        let coord = AbortCoordinator::new();
        let epoch = coord.current();
        assert_eq!(epoch.id(), 0);
        assert!(!epoch.is_aborted());
    }

    #[test]
    fn abort_replaces_the_live_epoch() {
        let coord = AbortCoordinator::new();
        let before = coord.current();
        let token = before.token();

        let next = coord.abort();

        assert!(token.is_cancelled());
        assert!(before.is_aborted());
        let after = coord.current();
        assert_eq!(after.id(), next);
        assert_ne!(after.id(), before.id());
        assert!(!after.is_aborted());
    }

    #[test]
    fn exactly_one_live_epoch_after_repeated_aborts() {
        let coord = AbortCoordinator::new();
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(coord.current());
            let _ = coord.abort();
        }
        assert!(seen.iter().all(AbortEpoch::is_aborted));
        let live = coord.current();
        assert!(!live.is_aborted());
        assert!(seen.iter().all(|e| e.id() != live.id()));
    }

    #[test]
    fn stale_abort_is_ignored() {
        let coord = AbortCoordinator::new();
        let old = coord.current().id();
        let _ = coord.abort();
        let fresh = coord.current();

        assert!(!coord.abort_if_current(old));
        assert!(!fresh.is_aborted());
        assert_eq!(coord.current().id(), fresh.id());

        assert!(coord.abort_if_current(fresh.id()));
        assert!(fresh.is_aborted());
    }

    #[tokio::test]
    async fn waiters_are_released() {
        let coord = AbortCoordinator::new();
        let token = coord.current().token();
        let handle = tokio::spawn(async move {
            token.cancelled().await;
            true
        });
        let _ = coord.abort();
        assert!(handle.await.unwrap());
    }
}
