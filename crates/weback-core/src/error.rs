// ── Core error types ──
//
// User-facing errors from weback-core. Consumers never see HTTP status
// codes or JSON parse failures directly; `From<weback_api::Error>`
// translates wire-level failures into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach the WeBack cloud: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Not connected -- call connect() first")]
    NotConnected,

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Command not delivered: {message}")]
    SendFailed { message: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("Cloud API error: {message}")]
    Api { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether logging in again could fix this.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }
}

// ── Conversion from wire-level errors ────────────────────────────────

impl From<weback_api::Error> for CoreError {
    fn from(err: weback_api::Error) -> Self {
        match err {
            weback_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            weback_api::Error::SessionExpired => CoreError::AuthenticationFailed {
                message: "Session expired -- re-authentication required".into(),
            },
            weback_api::Error::Api { message } => CoreError::Api { message },
            weback_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                    }
                }
            }
            weback_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            weback_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                reason: format!("TLS error: {msg}"),
            },
            weback_api::Error::StreamConnect(reason) => CoreError::ConnectionFailed {
                reason: format!("stream connection failed: {reason}"),
            },
            weback_api::Error::StreamClosed { code, reason } => CoreError::ConnectionFailed {
                reason: format!("stream closed (code {code}): {reason}"),
            },
            weback_api::Error::Send { message } => CoreError::SendFailed { message },
            weback_api::Error::Protocol { message } => {
                CoreError::Internal(format!("Protocol error: {message}"))
            }
            weback_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            weback_api::Error::Encode(e) => CoreError::Internal(format!("Encoding error: {e}")),
        }
    }
}
