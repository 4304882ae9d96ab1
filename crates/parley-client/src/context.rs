//! Injectable client context.
//!
//! Holds everything the two communication subsystems share: clock,
//! credentials, ports, abort coordinator, busy indicator, request
//! dispatcher, HTTP client and link monitor. Built once from
//! [`ClientSettings`] and torn down with [`ClientContext::shutdown`].

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use parley_channel::{
    ChannelSupervisor, ChannelTiming, Connector, FailureCause, HandlerRegistry, LinkMonitor,
    WsConnector,
};
use parley_core::credentials::credentials_file_path;
use parley_core::{
    AlwaysOnline, AuthExpiry, Clock, ConnectivityProbe, CredentialStore, Credentials,
    FileCredentialStore, HistoryNavigator, LinkInfo, Navigator, Notifier, TokioClock,
    TracingNotifier,
};
use parley_request::{
    AbortCoordinator, BusyIndicator, ErrorRouter, HttpClient, RequestDispatcher, RequestOptions,
};
use parley_settings::ClientSettings;
use parley_settings::loader::parley_dir;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::errors::{ClientError, Result};

type SuccessFn = Box<dyn Fn() + Send + Sync>;
type FailureFn = Box<dyn Fn(&FailureCause) + Send + Sync>;

/// Callbacks for one channel.
#[derive(Default)]
pub struct ChannelCallbacks {
    on_success: Option<SuccessFn>,
    on_failure: Option<FailureFn>,
}

impl ChannelCallbacks {
    /// No callbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run when the channel opens.
    #[must_use]
    pub fn on_success(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    /// Run when the channel fails.
    #[must_use]
    pub fn on_failure(mut self, f: impl Fn(&FailureCause) + Send + Sync + 'static) -> Self {
        self.on_failure = Some(Box::new(f));
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for [`ClientContext`]. Every port defaults to a host-less
/// implementation.
pub struct ClientContextBuilder {
    settings: ClientSettings,
    credentials: Option<Arc<dyn CredentialStore>>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    connectivity: Arc<dyn ConnectivityProbe>,
    clock: Arc<dyn Clock>,
    connector: Arc<dyn Connector>,
}

impl ClientContextBuilder {
    /// Credential storage. Defaults to the file named in the settings, or
    /// `~/.parley/credentials.json`.
    #[must_use]
    pub fn credentials(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    /// Notice sink. Defaults to the log.
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// View router. Defaults to an in-memory history.
    #[must_use]
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    /// Connectivity probe. Defaults to always online.
    #[must_use]
    pub fn connectivity(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.connectivity = probe;
        self
    }

    /// Timer source. Defaults to tokio timers.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Channel transport. Defaults to WebSocket.
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Validate the settings and wire everything together.
    pub fn build(self) -> Result<ClientContext> {
        self.settings.validate()?;

        let credentials = self.credentials.unwrap_or_else(|| {
            let path = self
                .settings
                .credentials_path
                .as_ref()
                .map_or_else(|| credentials_file_path(&parley_dir()), PathBuf::from);
            let store: Arc<dyn CredentialStore> = Arc::new(FileCredentialStore::new(path));
            store
        });

        let auth_expiry = AuthExpiry::new(
            credentials.clone(),
            self.notifier.clone(),
            self.navigator.clone(),
        );
        let abort = Arc::new(AbortCoordinator::new());
        let busy = BusyIndicator::new(self.clock.clone(), self.settings.request.busy_grace());
        let router = ErrorRouter::new(
            abort.clone(),
            self.notifier.clone(),
            self.navigator.clone(),
            auth_expiry.clone(),
        );
        let dispatcher = RequestDispatcher::new(
            self.connectivity,
            self.notifier,
            busy,
            abort,
            router,
        );
        let http = HttpClient::new(
            self.settings.endpoints.http_base_url.as_str(),
            self.settings.request.timeout(),
        )?;

        info!(
            http = %self.settings.endpoints.http_base_url,
            ws = %self.settings.endpoints.ws_base_url,
            "client context ready"
        );

        Ok(ClientContext {
            settings: self.settings,
            credentials,
            navigator: self.navigator,
            auth_expiry,
            clock: self.clock,
            connector: self.connector,
            dispatcher,
            http,
            link: LinkMonitor::new(),
            channels: Mutex::new(Vec::new()),
            shutdown: CancellationToken::new(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Context
// ─────────────────────────────────────────────────────────────────────────────

/// Shared client state.
pub struct ClientContext {
    settings: ClientSettings,
    credentials: Arc<dyn CredentialStore>,
    navigator: Arc<dyn Navigator>,
    auth_expiry: AuthExpiry,
    clock: Arc<dyn Clock>,
    connector: Arc<dyn Connector>,
    dispatcher: RequestDispatcher,
    http: HttpClient,
    link: LinkMonitor,
    channels: Mutex<Vec<ChannelSupervisor>>,
    shutdown: CancellationToken,
}

impl ClientContext {
    /// Start building a context from settings.
    pub fn builder(settings: ClientSettings) -> ClientContextBuilder {
        ClientContextBuilder {
            settings,
            credentials: None,
            notifier: Arc::new(TracingNotifier),
            navigator: Arc::new(HistoryNavigator::default()),
            connectivity: Arc::new(AlwaysOnline),
            clock: Arc::new(TokioClock),
            connector: Arc::new(WsConnector),
        }
    }

    /// Context with every default port.
    pub fn new(settings: ClientSettings) -> Result<Self> {
        Self::builder(settings).build()
    }

    /// Settings the context was built with.
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Request dispatcher.
    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    /// HTTP verbs.
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Busy indicator.
    pub fn busy(&self) -> &BusyIndicator {
        self.dispatcher.busy()
    }

    /// Link status shared by every channel this context opens.
    pub fn link(&self) -> &LinkMonitor {
        &self.link
    }

    /// Current link status.
    pub fn link_info(&self) -> LinkInfo {
        self.link.current()
    }

    /// Credential storage.
    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// View router.
    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    /// Token cancelled by [`ClientContext::shutdown`].
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Request options seeded from the settings.
    pub fn request_options(&self) -> RequestOptions {
        RequestOptions::default()
            .busy(self.settings.request.busy_by_default)
            .abort_on_error(self.settings.request.abort_on_error)
    }

    /// Full channel URL for `path`.
    pub fn channel_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.settings.endpoints.ws_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Channel timing from the settings.
    pub fn channel_timing(&self) -> ChannelTiming {
        ChannelTiming {
            heartbeat_interval: self.settings.channel.heartbeat_interval(),
            liveness_deadline: self.settings.channel.liveness_deadline(),
        }
    }

    /// Open a channel to `path` with the stored token.
    ///
    /// The supervisor is tracked and torn down by [`ClientContext::shutdown`].
    /// Opening the same path again gives a fresh, independent session.
    pub fn open_channel(
        &self,
        path: &str,
        registry: HandlerRegistry,
        callbacks: ChannelCallbacks,
    ) -> Result<ChannelSupervisor> {
        if self.shutdown.is_cancelled() {
            return Err(ClientError::ShuttingDown);
        }

        let mut builder = ChannelSupervisor::builder(self.connector.clone(), self.clock.clone())
            .registry(registry)
            .link(self.link.clone())
            .timing(self.channel_timing())
            .auth_expiry(self.auth_expiry.clone());
        if let Some(f) = callbacks.on_success {
            builder = builder.on_success(f);
        }
        if let Some(f) = callbacks.on_failure {
            builder = builder.on_failure(f);
        }
        let supervisor = builder.build();

        let url = self.channel_url(path);
        info!(%url, "opening channel");
        supervisor.open(url, self.credentials.token())?;

        let mut channels = self.channels.lock();
        channels.retain(|c| !c.state().is_closed());
        channels.push(supervisor.clone());
        Ok(supervisor)
    }

    /// Store credentials after sign-in.
    pub fn login(&self, credentials: Credentials) -> Result<()> {
        self.credentials.set(credentials)?;
        info!("credentials stored");
        Ok(())
    }

    /// Clear stored credentials.
    pub fn logout(&self) -> Result<()> {
        self.credentials.clear()?;
        info!("credentials cleared");
        Ok(())
    }

    /// Tear down every open channel and abort in-flight requests.
    /// Idempotent.
    pub fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();

        let channels = std::mem::take(&mut *self.channels.lock());
        let count = channels.len();
        for channel in channels {
            channel.teardown();
        }
        let _ = self.dispatcher.abort().abort();
        info!(channels = count, "client context shut down");
    }
}

impl Drop for ClientContext {
    fn drop(&mut self) {
        if !self.shutdown.is_cancelled() {
            warn!("client context dropped without shutdown");
            self.shutdown();
        }
    }
}
