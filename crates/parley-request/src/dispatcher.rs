//! Business-request wrapper.
//!
//! Every call goes through [`RequestDispatcher::dispatch`]:
//!
//! 1. connectivity precheck (offline calls are never attempted)
//! 2. busy indicator held for the call's lifetime
//! 3. the live abort epoch captured and raced against the call
//! 4. on failure: abort the epoch (when enabled), then the caller's error
//!    policy or the [`ErrorRouter`]

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parley_core::constants::NOTICE_NETWORK_UNAVAILABLE;
use parley_core::{ConnectivityProbe, Notifier};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::abort::{AbortCoordinator, AbortEpoch};
use crate::busy::BusyIndicator;
use crate::errors::RequestError;
use crate::router::ErrorRouter;

/// Caller-supplied error handler. Returns `true` when it fully handled the
/// error.
pub type ErrorHandlerFn = Box<dyn Fn(&RequestError) -> bool + Send + Sync>;

/// How a failed call's error is handled.
#[derive(Default)]
pub enum ErrorHandling {
    /// Route through the default policy.
    #[default]
    Delegate,
    /// Offer the error to the handler first; route it if the handler
    /// declines.
    Handled(ErrorHandlerFn),
    /// Return the raw error to the caller untouched.
    Skip,
}

impl ErrorHandling {
    /// Wrap a closure as [`ErrorHandling::Handled`].
    pub fn handled<F>(f: F) -> Self
    where
        F: Fn(&RequestError) -> bool + Send + Sync + 'static,
    {
        Self::Handled(Box::new(f))
    }
}

impl fmt::Debug for ErrorHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delegate => f.write_str("Delegate"),
            Self::Handled(_) => f.write_str("Handled(..)"),
            Self::Skip => f.write_str("Skip"),
        }
    }
}

/// Per-call options.
#[derive(Debug)]
pub struct RequestOptions {
    /// Hold the busy indicator while the call is in flight.
    pub busy: bool,
    /// Participate in abort: the call is cancelled when its epoch is
    /// aborted, and its own failure aborts the epoch.
    pub abort_on_error: bool,
    /// Error policy.
    pub errors: ErrorHandling,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            busy: true,
            abort_on_error: true,
            errors: ErrorHandling::Delegate,
        }
    }
}

impl RequestOptions {
    /// Set whether the busy indicator is held.
    #[must_use]
    pub fn busy(mut self, busy: bool) -> Self {
        self.busy = busy;
        self
    }

    /// Set abort participation.
    #[must_use]
    pub fn abort_on_error(mut self, abort: bool) -> Self {
        self.abort_on_error = abort;
        self
    }

    /// Set the error policy.
    #[must_use]
    pub fn errors(mut self, errors: ErrorHandling) -> Self {
        self.errors = errors;
        self
    }

    /// Shorthand for [`ErrorHandling::Skip`].
    #[must_use]
    pub fn skip_errors(self) -> Self {
        self.errors(ErrorHandling::Skip)
    }
}

/// Handed to the call; carries its cancellation signal.
#[derive(Clone, Debug)]
pub struct RequestContext {
    epoch: u64,
    signal: Option<CancellationToken>,
    busy: bool,
}

impl RequestContext {
    /// Context that can never be cancelled. For calls made outside a
    /// dispatcher.
    pub fn detached() -> Self {
        Self {
            epoch: 0,
            signal: None,
            busy: false,
        }
    }

    /// Context cancelled with `epoch`. For calls made outside a dispatcher
    /// that still join the abort epoch.
    pub fn under(epoch: &AbortEpoch) -> Self {
        Self {
            epoch: epoch.id(),
            signal: Some(epoch.token()),
            busy: false,
        }
    }

    /// Abort epoch the call was issued under.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether the busy indicator is held for this call.
    pub fn holds_busy(&self) -> bool {
        self.busy
    }

    /// Whether the call has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.signal.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Race `fut` against the cancellation signal.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T, RequestError>
    where
        F: Future<Output = Result<T, RequestError>>,
    {
        let Some(token) = &self.signal else {
            return fut.await;
        };
        tokio::select! {
            biased;
            () = token.cancelled() => Err(RequestError::Cancelled),
            result = fut => result,
        }
    }
}

/// Result of a dispatched call.
#[derive(Debug, PartialEq)]
pub enum Outcome<T> {
    /// The call produced a value.
    Success(T),
    /// The call failed and the error was fully handled.
    Handled,
    /// The call failed and the error is returned to the caller.
    Unhandled(RequestError),
}

impl<T> Outcome<T> {
    /// The value, if any.
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Whether the call succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The returned error, if any.
    pub fn error(&self) -> Option<&RequestError> {
        match self {
            Self::Unhandled(err) => Some(err),
            _ => None,
        }
    }

    /// Collapse into a `Result`. A handled error becomes `None`.
    pub fn into_result(self) -> Result<Option<T>, RequestError> {
        match self {
            Self::Success(value) => Ok(Some(value)),
            Self::Handled => Ok(None),
            Self::Unhandled(err) => Err(err),
        }
    }
}

/// Wraps business calls with connectivity, busy, abort and error routing.
#[derive(Clone)]
pub struct RequestDispatcher {
    connectivity: Arc<dyn ConnectivityProbe>,
    notifier: Arc<dyn Notifier>,
    busy: BusyIndicator,
    abort: Arc<AbortCoordinator>,
    router: ErrorRouter,
}

impl RequestDispatcher {
    /// Create a dispatcher. `abort` must be the coordinator `router` was
    /// built with.
    pub fn new(
        connectivity: Arc<dyn ConnectivityProbe>,
        notifier: Arc<dyn Notifier>,
        busy: BusyIndicator,
        abort: Arc<AbortCoordinator>,
        router: ErrorRouter,
    ) -> Self {
        Self {
            connectivity,
            notifier,
            busy,
            abort,
            router,
        }
    }

    /// The busy indicator.
    pub fn busy(&self) -> &BusyIndicator {
        &self.busy
    }

    /// The abort coordinator.
    pub fn abort(&self) -> &Arc<AbortCoordinator> {
        &self.abort
    }

    /// Run `call` under `options`.
    pub async fn dispatch<T, F, Fut>(&self, options: RequestOptions, call: F) -> Outcome<T>
    where
        F: FnOnce(RequestContext) -> Fut,
        Fut: Future<Output = Result<T, RequestError>>,
    {
        if !self.connectivity.is_online() {
            self.notifier.error(NOTICE_NETWORK_UNAVAILABLE);
            debug!("request skipped, host offline");
            return match options.errors {
                ErrorHandling::Skip => Outcome::Unhandled(RequestError::Offline),
                _ => Outcome::Handled,
            };
        }

        let _busy = options.busy.then(|| self.busy.guard());
        let epoch = self.abort.current();
        let ctx = RequestContext {
            epoch: epoch.id(),
            signal: options.abort_on_error.then(|| epoch.token()),
            busy: options.busy,
        };

        let err = match ctx.guard(call(ctx.clone())).await {
            Ok(value) => return Outcome::Success(value),
            Err(err) => err,
        };

        if options.abort_on_error && !err.is_cancelled() && self.abort.abort_if_current(epoch.id())
        {
            warn!(error = %err, epoch = epoch.id(), "request failed, aborting in-flight calls");
        }

        match options.errors {
            ErrorHandling::Skip => Outcome::Unhandled(err),
            ErrorHandling::Handled(handler) => {
                if handler(&err) {
                    Outcome::Handled
                } else {
                    self.route(err, epoch.id())
                }
            }
            ErrorHandling::Delegate => self.route(err, epoch.id()),
        }
    }

    fn route<T>(&self, err: RequestError, epoch: u64) -> Outcome<T> {
        if err.is_cancelled() {
            return Outcome::Unhandled(err);
        }
        let _ = self.router.route(&err, epoch);
        Outcome::Handled
    }
}
