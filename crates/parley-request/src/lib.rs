//! # parley-request
//!
//! Wraps every business call with:
//!
//! - **Connectivity precheck**: offline calls are never attempted
//! - **Busy indicator**: reference-counted, deferred hide
//! - **Abort epoch**: cooperative cancellation shared by in-flight calls
//! - **Error routing**: notices and navigation by error class, overridable
//!   per call
//!
//! Cancellation is best-effort. A cancelled call's response is discarded,
//! but the server may still have processed it.

#![deny(unsafe_code)]

pub mod abort;
pub mod busy;
pub mod dispatcher;
pub mod errors;
pub mod http;
pub mod router;

pub use abort::{AbortCoordinator, AbortEpoch};
pub use busy::{BusyGuard, BusyIndicator};
pub use dispatcher::{
    ErrorHandlerFn, ErrorHandling, Outcome, RequestContext, RequestDispatcher, RequestOptions,
};
pub use errors::RequestError;
pub use http::HttpClient;
pub use router::{ErrorRouter, RouteAction, decide};
