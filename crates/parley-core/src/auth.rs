//! The auth-failure action shared by the channel and the request layer.

use std::sync::Arc;

use tracing::{info, warn};

use crate::constants::NOTICE_SESSION_EXPIRED;
use crate::credentials::CredentialStore;
use crate::ports::{Navigator, Notifier, Route};

/// Clears credentials and sends the user to the login view, remembering the
/// path they were on so it can be restored after sign-in.
#[derive(Clone)]
pub struct AuthExpiry {
    credentials: Arc<dyn CredentialStore>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
}

impl AuthExpiry {
    /// Create the action over the given ports.
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            credentials,
            notifier,
            navigator,
        }
    }

    /// Run the action with the server's message, or the default notice.
    pub fn expire(&self, message: Option<&str>) {
        if let Err(e) = self.credentials.clear() {
            warn!(error = %e, "failed to clear credentials");
        }
        self.notifier.error(message.unwrap_or(NOTICE_SESSION_EXPIRED));

        let current = self.navigator.current_path();
        let redirect = (current != "/").then_some(current);
        info!(redirect = ?redirect, "session expired, redirecting to login");
        self.navigator.replace(Route::Login { redirect });
    }
}
