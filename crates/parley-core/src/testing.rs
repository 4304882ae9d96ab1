//! Recording port implementations for tests.

use parking_lot::Mutex;

use crate::ports::{Navigator, Notifier, Route};

/// Navigator that records every navigation.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    current: Mutex<String>,
    pushed: Mutex<Vec<Route>>,
    replaced: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    /// Navigator currently showing `path`.
    pub fn at(path: impl Into<String>) -> Self {
        Self {
            current: Mutex::new(path.into()),
            ..Self::default()
        }
    }

    /// Routes passed to [`Navigator::push`].
    pub fn pushed(&self) -> Vec<Route> {
        self.pushed.lock().clone()
    }

    /// Routes passed to [`Navigator::replace`].
    pub fn replaced(&self) -> Vec<Route> {
        self.replaced.lock().clone()
    }

    /// Total navigations of either kind.
    pub fn navigation_count(&self) -> usize {
        self.pushed.lock().len() + self.replaced.lock().len()
    }
}

impl Navigator for RecordingNavigator {
    fn current_path(&self) -> String {
        self.current.lock().clone()
    }

    fn push(&self, route: Route) {
        *self.current.lock() = route.to_string();
        self.pushed.lock().push(route);
    }

    fn replace(&self, route: Route) {
        *self.current.lock() = route.to_string();
        self.replaced.lock().push(route);
    }
}

/// Notifier that records every notice.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    /// Notices shown so far.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn error(&self, message: &str) {
        self.messages.lock().push(message.to_owned());
    }
}
