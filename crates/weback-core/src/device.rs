// ── Device session ──
//
// Per-device facade over the shared stream: typed reads of the cached
// status and typed commands. One background listener per device keeps
// the cache in sync with stream pushes addressed to it.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};
use weback_api::protocol::{self, keys};
use weback_api::{AuthSession, DeviceDescriptor, Error as ApiError, Message, StatusUpdate, StreamSession};

use crate::error::CoreError;
use crate::model::{FanSpeed, LifecycleState, Mode, ModeCategory, RobotStatus, WorkingMode};
use crate::stream::StatusStream;

/// Handle to one robot.
///
/// Cheaply cloneable. The status listener stops when the last clone is
/// dropped. Must be created inside a tokio runtime.
#[derive(Clone)]
pub struct DeviceSession {
    inner: Arc<DeviceInner>,
}

struct DeviceInner {
    descriptor: DeviceDescriptor,
    stream: Arc<StreamSession>,
    /// Session to drop when the stream rejects the token.
    auth: Option<Arc<AuthSession>>,
    status: Arc<watch::Sender<Arc<RobotStatus>>>,
    _listener: DropGuard,
}

impl DeviceSession {
    /// Wrap `descriptor`, seeding the cache with its list-time status, and
    /// start listening for pushes on `stream`.
    pub fn new(descriptor: DeviceDescriptor, stream: Arc<StreamSession>) -> Self {
        Self::build(descriptor, stream, None)
    }

    /// Like [`new`](Self::new), and invalidates `auth`'s session when a
    /// command fails because the stream refused the token.
    pub fn with_auth(descriptor: DeviceDescriptor, stream: Arc<StreamSession>, auth: Arc<AuthSession>) -> Self {
        Self::build(descriptor, stream, Some(auth))
    }

    fn build(descriptor: DeviceDescriptor, stream: Arc<StreamSession>, auth: Option<Arc<AuthSession>>) -> Self {
        let initial = RobotStatus::new(descriptor.thing_status.clone());
        let (status, _) = watch::channel(Arc::new(initial));
        let status = Arc::new(status);

        let cancel = CancellationToken::new();
        tokio::spawn(listen(
            descriptor.thing_name.clone(),
            stream.subscribe(),
            Arc::clone(&status),
            cancel.clone(),
        ));

        Self {
            inner: Arc::new(DeviceInner {
                descriptor,
                stream,
                auth,
                status,
                _listener: cancel.drop_guard(),
            }),
        }
    }

    // ── Identity ─────────────────────────────────────────────────────

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.inner.descriptor
    }

    pub fn thing_name(&self) -> &str {
        &self.inner.descriptor.thing_name
    }

    pub fn sub_type(&self) -> &str {
        &self.inner.descriptor.sub_type
    }

    pub fn display_name(&self) -> &str {
        self.inner.descriptor.display_name()
    }

    // ── Status reads ─────────────────────────────────────────────────

    /// Snapshot of the cached status.
    pub fn status(&self) -> Arc<RobotStatus> {
        self.inner.status.borrow().clone()
    }

    /// Watch status changes.
    pub fn subscribe(&self) -> StatusStream {
        StatusStream::new(self.inner.status.subscribe())
    }

    /// Current mode.
    ///
    /// A device that never reported one is treated as idle: the cached
    /// status gets `Hibernating` (plus default battery and fan values),
    /// and keeps them until the next push.
    pub fn current_mode(&self) -> Mode {
        self.inner.status.send_if_modified(|status| {
            if status.is_uninitialized() {
                debug!(thing = %self.thing_name(), "no working status yet, assuming idle");
                Arc::make_mut(status).ensure_defaults()
            } else {
                false
            }
        });
        self.status().mode()
    }

    pub fn working_mode(&self) -> Option<WorkingMode> {
        self.current_mode().known()
    }

    pub fn lifecycle_state(&self) -> Option<LifecycleState> {
        self.current_mode().lifecycle()
    }

    pub fn is_cleaning(&self) -> bool {
        self.current_mode().category() == ModeCategory::Cleaning
    }

    pub fn is_charging(&self) -> bool {
        self.current_mode().category() == ModeCategory::Charging
    }

    /// On the dock, charging or not.
    pub fn is_docked(&self) -> bool {
        matches!(
            self.current_mode().category(),
            ModeCategory::Charging | ModeCategory::Docked
        )
    }

    pub fn is_available(&self) -> bool {
        self.status().is_connected()
    }

    pub fn battery_level(&self) -> Option<u8> {
        self.status().battery_level()
    }

    pub fn fan_speed(&self) -> Option<FanSpeed> {
        self.status().fan_speed()
    }

    pub fn fan_speed_list(&self) -> &'static [FanSpeed] {
        &FanSpeed::SETTABLE
    }

    pub fn error_info(&self) -> Option<String> {
        self.status().error_info()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Ask the cloud to push this device's status. The answer arrives on
    /// the stream; this does not wait for it.
    pub async fn refresh_status(&self) -> Result<(), CoreError> {
        self.send(&protocol::status_query(self.thing_name(), self.sub_type()))
            .await
    }

    pub async fn set_fan_speed(&self, speed: FanSpeed) -> Result<(), CoreError> {
        if !speed.is_settable() {
            return Err(CoreError::InvalidArgument {
                message: format!("fan speed {speed} cannot be set"),
            });
        }
        self.send(&protocol::set_field(
            self.thing_name(),
            self.sub_type(),
            keys::FAN_STATUS,
            speed.as_str(),
        ))
        .await
    }

    pub async fn set_working_mode(&self, mode: WorkingMode) -> Result<(), CoreError> {
        self.send(&protocol::set_field(
            self.thing_name(),
            self.sub_type(),
            keys::WORKING_STATUS,
            mode.as_str(),
        ))
        .await
    }

    /// Start an automatic clean.
    pub async fn start(&self) -> Result<(), CoreError> {
        self.set_working_mode(WorkingMode::AutoClean).await
    }

    pub async fn resume(&self) -> Result<(), CoreError> {
        self.start().await
    }

    pub async fn pause(&self) -> Result<(), CoreError> {
        self.set_working_mode(WorkingMode::Standby).await
    }

    pub async fn stop(&self) -> Result<(), CoreError> {
        self.pause().await
    }

    pub async fn return_to_base(&self) -> Result<(), CoreError> {
        self.set_working_mode(WorkingMode::BackCharging).await
    }

    pub async fn spot_clean(&self) -> Result<(), CoreError> {
        self.set_working_mode(WorkingMode::SpotClean).await
    }

    /// Make the robot play its locator sound.
    pub async fn locate(&self) -> Result<(), CoreError> {
        self.set_working_mode(WorkingMode::LocationAlarm).await
    }

    /// Drive to `point` (vendor map coordinates, passed through as-is).
    pub async fn goto_point(&self, point: &Value) -> Result<(), CoreError> {
        let (update, sync) = protocol::goto_point(self.thing_name(), self.sub_type(), point);
        self.send_all(&[update, sync]).await
    }

    /// Clean the zone `rect` (vendor map rectangle, passed through as-is).
    pub async fn clean_rect(&self, rect: &Value) -> Result<(), CoreError> {
        let (update, sync) = protocol::clean_rect(self.thing_name(), self.sub_type(), rect);
        self.send_all(&[update, sync]).await
    }

    async fn send(&self, message: &Message) -> Result<(), CoreError> {
        debug!(thing = %self.thing_name(), opt = message.opt(), "sending command");
        self.inner.stream.send(message).await.map_err(|e| {
            warn!(thing = %self.thing_name(), error = %e, "command not delivered");
            self.command_error(e)
        })
    }

    async fn send_all(&self, messages: &[Message]) -> Result<(), CoreError> {
        debug!(thing = %self.thing_name(), count = messages.len(), "sending command sequence");
        self.inner.stream.send_all(messages).await.map_err(|e| {
            warn!(thing = %self.thing_name(), error = %e, "command sequence not delivered");
            self.command_error(e)
        })
    }

    fn command_error(&self, err: ApiError) -> CoreError {
        if let Some(auth) = self.inner.auth.as_ref().filter(|_| err.is_auth_expired()) {
            warn!(thing = %self.thing_name(), "stream rejected the session token");
            auth.invalidate();
        }
        CoreError::from(err)
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("thing_name", &self.thing_name())
            .field("nickname", &self.inner.descriptor.thing_nickname)
            .field("sub_type", &self.sub_type())
            .finish_non_exhaustive()
    }
}

// ── Background listener ──────────────────────────────────────────────

async fn listen(
    thing_name: String,
    mut updates: broadcast::Receiver<Arc<StatusUpdate>>,
    status: Arc<watch::Sender<Arc<RobotStatus>>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            received = updates.recv() => match received {
                Ok(update) => {
                    if update.is_for(&thing_name) {
                        debug!(thing = %thing_name, "status updated");
                        status.send_replace(Arc::new(RobotStatus::from_update(&update)));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(thing = %thing_name, skipped, "status listener lagged, updates dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    debug!(thing = %thing_name, "status listener stopped");
}
