use thiserror::Error;

/// Top-level error type for the `weback-api` crate.
///
/// Covers every failure mode across the cloud surfaces:
/// login, device listing, the command stream, and inbound payloads.
/// `weback-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed (wrong credentials or region, service unreachable,
    /// unreadable response).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The bearer token was rejected -- log in again.
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Authenticated API ───────────────────────────────────────────
    /// Non-success `msg` in an authenticated API response.
    #[error("Cloud API error: {message}")]
    Api { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup error while building the HTTP client.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Stream ──────────────────────────────────────────────────────
    /// The stream did not reach `Open` within the wait window.
    #[error("Stream connection failed: {0}")]
    StreamConnect(String),

    /// Stream closed by the server.
    #[error("Stream closed (code {code}): {reason}")]
    StreamClosed { code: u16, reason: String },

    /// A message could not be delivered, even after one reconnect attempt.
    #[error("Failed to send message: {message}")]
    Send { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// Malformed or unexpected inbound stream payload.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Outbound message could not be encoded.
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if this error indicates auth has expired
    /// and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::SessionExpired)
    }

    pub(crate) fn send(message: impl Into<String>) -> Self {
        Self::Send {
            message: message.into(),
        }
    }
}

/// First 200 bytes of a response body, cut on a char boundary.
pub(crate) fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
