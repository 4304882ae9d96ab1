//! Default error-routing policy.
//!
//! | Error | Action |
//! |---|---|
//! | cancelled | nothing |
//! | offline | "network unavailable" notice |
//! | network | abort the failing call's epoch, "network error" notice |
//! | other no-response | `/error/other` |
//! | 400 | server message as notice |
//! | 401 | clear credentials, redirect to login |
//! | 404 | `/error/404` |
//! | 500, 503, 504 | `/error/<status>` |
//! | any other status | `/error/other` |

use std::sync::Arc;

use parley_core::constants::{
    NOTICE_BAD_REQUEST, NOTICE_NETWORK_ERROR, NOTICE_NETWORK_UNAVAILABLE,
};
use parley_core::{AuthExpiry, Navigator, Notifier, Route};
use tracing::{debug, info};

use crate::abort::AbortCoordinator;
use crate::errors::RequestError;

/// What the router does for an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteAction {
    /// Swallow silently.
    Ignore,
    /// Abort the failing call's epoch and show a notice.
    AbortAndNotify(String),
    /// Show a notice and stay.
    Notify(String),
    /// Clear credentials and go to login, with the server's message.
    ExpireSession(Option<String>),
    /// Navigate to an error view.
    Navigate(Route),
}

/// Map an error to its action. Pure.
pub fn decide(err: &RequestError) -> RouteAction {
    match err {
        RequestError::Cancelled => RouteAction::Ignore,
        RequestError::Offline => RouteAction::Notify(NOTICE_NETWORK_UNAVAILABLE.to_owned()),
        RequestError::Network(_) => RouteAction::AbortAndNotify(NOTICE_NETWORK_ERROR.to_owned()),
        RequestError::NoResponse(_) => RouteAction::Navigate(Route::GenericError),
        RequestError::Response {
            status, message, ..
        } => match status {
            400 => RouteAction::Notify(
                message
                    .clone()
                    .unwrap_or_else(|| NOTICE_BAD_REQUEST.to_owned()),
            ),
            401 => RouteAction::ExpireSession(message.clone()),
            404 => RouteAction::Navigate(Route::NotFound),
            500 | 503 | 504 => RouteAction::Navigate(Route::ServerError(*status)),
            _ => RouteAction::Navigate(Route::GenericError),
        },
    }
}

/// Carries out [`decide`]'s actions against the injected ports.
#[derive(Clone)]
pub struct ErrorRouter {
    abort: Arc<AbortCoordinator>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    auth_expiry: AuthExpiry,
}

impl ErrorRouter {
    /// Create a router.
    pub fn new(
        abort: Arc<AbortCoordinator>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        auth_expiry: AuthExpiry,
    ) -> Self {
        Self {
            abort,
            notifier,
            navigator,
            auth_expiry,
        }
    }

    /// Route an error raised by a call issued under `epoch`.
    pub fn route(&self, err: &RequestError, epoch: u64) -> RouteAction {
        let action = decide(err);
        debug!(error = %err, ?action, "routing request error");
        match &action {
            RouteAction::Ignore => {}
            RouteAction::AbortAndNotify(notice) => {
                let _ = self.abort.abort_if_current(epoch);
                self.notifier.error(notice);
            }
            RouteAction::Notify(notice) => self.notifier.error(notice),
            RouteAction::ExpireSession(message) => self.auth_expiry.expire(message.as_deref()),
            RouteAction::Navigate(route) => {
                info!(%route, "navigating to error view");
                self.navigator.push(route.clone());
            }
        }
        action
    }
}
