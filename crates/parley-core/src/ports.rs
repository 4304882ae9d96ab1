//! Ports to the collaborators outside the communication layer: navigation,
//! transient notices and connectivity reporting.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::{info, warn};

/// Characters escaped in a query value. Path separators and unreserved marks
/// stay readable.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Destination the communication layer may navigate to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// Login view, optionally carrying the path to restore after sign-in.
    Login {
        /// Path the user was on.
        redirect: Option<String>,
    },
    /// Not-found view.
    NotFound,
    /// Status-specific error view (500, 503, 504).
    ServerError(u16),
    /// Generic error view.
    GenericError,
    /// Any other application path.
    Path(String),
}

impl Route {
    /// Path component of the route.
    pub fn path(&self) -> String {
        match self {
            Self::Login { .. } => "/login".to_owned(),
            Self::NotFound => "/error/404".to_owned(),
            Self::ServerError(status) => format!("/error/{status}"),
            Self::GenericError => "/error/other".to_owned(),
            Self::Path(path) => path.clone(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login {
                redirect: Some(redirect),
            } => write!(
                f,
                "/login?redirect={}",
                utf8_percent_encode(redirect, QUERY_VALUE)
            ),
            other => f.write_str(&other.path()),
        }
    }
}

/// Application router.
pub trait Navigator: Send + Sync {
    /// Full path of the current view.
    fn current_path(&self) -> String;
    /// Push a new history entry.
    fn push(&self, route: Route);
    /// Replace the current history entry.
    fn replace(&self, route: Route);
}

/// Transient user-facing notices.
pub trait Notifier: Send + Sync {
    /// Show an error notice.
    fn error(&self, message: &str);
}

/// Reports whether the host currently has network connectivity.
pub trait ConnectivityProbe: Send + Sync {
    /// `false` when the host knows it is offline.
    fn is_online(&self) -> bool;
}

/// Probe for hosts without an offline signal.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysOnline;

impl ConnectivityProbe for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// Probe backed by a flag the host flips on network change events.
#[derive(Debug)]
pub struct ConnectivityFlag {
    online: AtomicBool,
}

impl ConnectivityFlag {
    /// Create a flag with the given initial state.
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    /// Record a connectivity change.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }
}

impl Default for ConnectivityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivityProbe for ConnectivityFlag {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }
}

/// Notifier that writes notices to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn error(&self, message: &str) {
        warn!(notice = message, "user notice");
    }
}

/// In-memory history for hosts without a view router of their own.
#[derive(Debug)]
pub struct HistoryNavigator {
    stack: Mutex<Vec<String>>,
}

impl HistoryNavigator {
    /// Start at `initial`.
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            stack: Mutex::new(vec![initial.into()]),
        }
    }

    /// Snapshot of the history, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.stack.lock().clone()
    }
}

impl Default for HistoryNavigator {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for HistoryNavigator {
    fn current_path(&self) -> String {
        self.stack.lock().last().cloned().unwrap_or_else(|| "/".to_owned())
    }

    fn push(&self, route: Route) {
        info!(%route, "navigate");
        self.stack.lock().push(route.to_string());
    }

    fn replace(&self, route: Route) {
        info!(%route, "navigate (replace)");
        let mut stack = self.stack.lock();
        let _ = stack.pop();
        stack.push(route.to_string());
    }
}
