//! Observable link status.

use parley_core::LinkInfo;
use tokio::sync::watch;

/// Publishes the channel's [`LinkInfo`] to any number of observers.
///
/// Observers only ever see the latest value. Clones share the same channel.
#[derive(Clone, Debug)]
pub struct LinkMonitor {
    tx: watch::Sender<LinkInfo>,
}

impl LinkMonitor {
    /// Create a monitor starting at the default (loading) status.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LinkInfo::default());
        Self { tx }
    }

    /// Replace the current status.
    pub fn set(&self, info: LinkInfo) {
        let _ = self.tx.send_replace(info);
    }

    /// Current status.
    pub fn current(&self) -> LinkInfo {
        self.tx.borrow().clone()
    }

    /// Subscribe to changes.
    pub fn subscribe(&self) -> watch::Receiver<LinkInfo> {
        self.tx.subscribe()
    }
}

impl Default for LinkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::LinkStatus;

    #[test]
    fn set_without_subscribers() {
        let monitor = LinkMonitor::new();
        assert_eq!(monitor.current().status, LinkStatus::Loading);
        monitor.set(LinkInfo::new(LinkStatus::Success, "connected"));
        assert_eq!(monitor.current().status, LinkStatus::Success);
    }

    #[tokio::test]
    async fn subscribers_see_latest() {
        let monitor = LinkMonitor::new();
        let mut rx = monitor.subscribe();
        monitor.clone().set(LinkInfo::new(LinkStatus::Failure, "lost"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().message, "lost");
    }
}
