// ── Controller ──
//
// Startup orchestration for one account: log in, list the devices, set
// up the shared stream, and hand out device sessions. Also the place to
// re-authenticate and shut everything down.

use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use weback_api::{
    AuthSession, ConnectionState, Connector, DeviceRegistry, Error as ApiError, Session,
    StreamSession, WsConnector,
};

use crate::config::ControllerConfig;
use crate::device::DeviceSession;
use crate::error::CoreError;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    auth: Arc<AuthSession>,
    registry: DeviceRegistry,
    connector: Arc<dyn Connector>,
    stream: ArcSwapOption<StreamSession>,
    devices: ArcSwap<Vec<DeviceSession>>,
}

impl Controller {
    /// Create a controller that talks to the real stream endpoint.
    /// Does NOT connect -- call [`connect()`](Self::connect).
    pub fn new(config: ControllerConfig) -> Result<Self, CoreError> {
        Self::with_connector(config, Arc::new(WsConnector))
    }

    /// Create a controller with a custom stream transport.
    pub fn with_connector(config: ControllerConfig, connector: Arc<dyn Connector>) -> Result<Self, CoreError> {
        let http = config.transport().build_client()?;
        let auth = AuthSession::with_client(http.clone(), config.credentials(), config.auth_url.clone());

        Ok(Self {
            inner: Arc::new(ControllerInner {
                registry: DeviceRegistry::new(http),
                auth: Arc::new(auth),
                config,
                connector,
                stream: ArcSwapOption::empty(),
                devices: ArcSwap::from_pointee(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Log in, list devices, and build the stream and device sessions.
    ///
    /// Login and listing failures are returned. With `eager_stream`, the
    /// stream is opened too, but a failure there only logs a warning:
    /// the first command will try again.
    pub async fn connect(&self) -> Result<(), CoreError> {
        let session = self.inner.auth.login().await.map_err(|e| self.api_error(e))?;
        let descriptors = self.list_devices(&session).await?;
        debug!(count = descriptors.len(), "device list loaded");

        let stream = Arc::new(StreamSession::new(
            &session,
            Arc::clone(&self.inner.connector),
            self.inner.config.stream_options(),
        ));

        let devices: Vec<DeviceSession> = descriptors
            .into_iter()
            .map(|descriptor| {
                DeviceSession::with_auth(descriptor, Arc::clone(&stream), Arc::clone(&self.inner.auth))
            })
            .collect();
        let count = devices.len();

        if let Some(previous) = self.inner.stream.swap(Some(Arc::clone(&stream))) {
            previous.shutdown();
        }
        self.inner.devices.store(Arc::new(devices));

        if self.inner.config.eager_stream {
            if let Err(e) = stream.connect().await {
                warn!(error = %e, "stream not open yet, commands will retry");
            }
        }

        info!(devices = count, "connected to WeBack cloud");
        Ok(())
    }

    async fn list_devices(&self, session: &Session) -> Result<Vec<weback_api::DeviceDescriptor>, CoreError> {
        match self.inner.registry.list(session).await {
            Ok(devices) => Ok(devices),
            Err(e @ ApiError::SessionExpired) => {
                self.inner.auth.invalidate();
                Err(e.into())
            }
            Err(e) => Err(self.api_error(e)),
        }
    }

    /// Translate an API error, filling in the configured request timeout.
    fn api_error(&self, err: ApiError) -> CoreError {
        match CoreError::from(err) {
            CoreError::Timeout { .. } => CoreError::Timeout {
                timeout_secs: self.inner.config.transport().effective_timeout().as_secs(),
            },
            other => other,
        }
    }

    /// Log in again and hand the new token to the stream for its next
    /// connection attempt.
    pub async fn reauthenticate(&self) -> Result<(), CoreError> {
        let session = self
            .inner
            .auth
            .reauthenticate()
            .await
            .map_err(|e| self.api_error(e))?;
        if let Some(stream) = self.inner.stream.load_full() {
            stream.update_session(&session);
        }
        info!("re-authenticated");
        Ok(())
    }

    /// Close the stream and drop all device sessions.
    pub fn shutdown(&self) {
        if let Some(stream) = self.inner.stream.swap(None) {
            stream.shutdown();
        }
        self.inner.devices.store(Arc::new(Vec::new()));
        debug!("controller shut down");
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// All devices, in the order the cloud listed them.
    pub fn devices(&self) -> Arc<Vec<DeviceSession>> {
        self.inner.devices.load_full()
    }

    /// Look up a device by thing name, or by nickname (case-insensitive).
    pub fn device(&self, identifier: &str) -> Result<DeviceSession, CoreError> {
        let devices = self.inner.devices.load();
        devices
            .iter()
            .find(|d| d.thing_name() == identifier)
            .or_else(|| {
                devices
                    .iter()
                    .find(|d| d.descriptor().thing_nickname.eq_ignore_ascii_case(identifier))
            })
            .cloned()
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: identifier.to_owned(),
            })
    }

    pub fn stream(&self) -> Result<Arc<StreamSession>, CoreError> {
        self.inner.stream.load_full().ok_or(CoreError::NotConnected)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner
            .stream
            .load_full()
            .map_or(ConnectionState::Closed, |s| s.state())
    }

    /// Whether a session is held. Turns false when the cloud rejects the
    /// token; [`reauthenticate`](Self::reauthenticate) restores it.
    pub fn is_authenticated(&self) -> bool {
        self.inner.auth.session().is_some()
    }

    pub fn watch_connection_state(&self) -> Result<watch::Receiver<ConnectionState>, CoreError> {
        Ok(self.stream()?.watch_state())
    }
}
