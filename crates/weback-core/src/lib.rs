// weback-core: Device sessions and status model between weback-api and consumers (CLI).

pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod model;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::ControllerConfig;
pub use controller::Controller;
pub use device::DeviceSession;
pub use error::CoreError;
pub use stream::StatusStream;

pub use model::{FanSpeed, LifecycleState, Mode, ModeCategory, RobotStatus, WorkingMode};

// Wire-level types consumers need without depending on weback-api directly.
pub use weback_api::{ConnectionState, DeviceDescriptor, StatusBlob};
