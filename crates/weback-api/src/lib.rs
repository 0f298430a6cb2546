// weback-api: Async Rust client for the WeBack robot vacuum cloud

pub mod auth;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod stream;
pub mod transport;

pub use auth::{AuthSession, Credentials, DEFAULT_AUTH_URL, LoginRequest, Session};
pub use error::Error;
pub use protocol::{Message, StatusBlob, StatusUpdate};
pub use registry::{DeviceDescriptor, DeviceRegistry};
pub use stream::{ConnectionState, Connector, StreamOptions, StreamSession, StreamTarget, WsConnector};
pub use transport::TransportConfig;
