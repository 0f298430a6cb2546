// Shared transport configuration for building reqwest::Client instances.
//
// Login and device listing share timeouts and the user agent through
// this module, avoiding duplicated builder logic.

use std::time::Duration;

const USER_AGENT: &str = concat!("weback-rs/", env!("CARGO_PKG_VERSION"));

/// Shared transport configuration for building HTTP clients.
///
/// `connect_timeout` is a floor for `timeout`: a whole request can never
/// be given less time than establishing its connection.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Overall request timeout. Default: 90s.
    pub timeout: Duration,
    /// TCP/TLS connect timeout. Default: 30s.
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(90),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    /// Overall timeout after applying the connect-timeout floor.
    pub fn effective_timeout(&self) -> Duration {
        self.timeout.max(self.connect_timeout)
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        reqwest::Client::builder()
            .timeout(self.effective_timeout())
            .connect_timeout(self.connect_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| crate::error::Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}
