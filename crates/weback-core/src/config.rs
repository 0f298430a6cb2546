// ── Runtime connection configuration ──
//
// Describes *how* to reach the WeBack cloud: credentials plus connection
// tuning. Never touches disk; the CLI builds a `ControllerConfig` (via
// weback-config) and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;
use weback_api::{Credentials, DEFAULT_AUTH_URL, StreamOptions, TransportConfig};

/// Configuration for one account on the WeBack cloud.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Account identifier (e-mail or phone number).
    pub account: String,
    pub password: SecretString,
    /// International calling code of the account's country.
    pub region: String,
    /// Language the cloud answers in.
    pub language: String,
    /// Login endpoint.
    pub auth_url: Url,
    /// Overall HTTP request timeout.
    pub timeout: Duration,
    /// HTTP connect timeout; also a floor for `timeout`.
    pub connect_timeout: Duration,
    /// How long a stream connect waits for the open signal.
    pub stream_wait: Duration,
    /// Open the stream during `Controller::connect` instead of on first send.
    pub eager_stream: bool,
}

impl ControllerConfig {
    pub fn new(account: impl Into<String>, password: SecretString, region: impl Into<String>) -> Self {
        let transport = TransportConfig::default();
        Self {
            account: account.into(),
            password,
            region: region.into(),
            language: "en".into(),
            auth_url: default_auth_url(),
            timeout: transport.timeout,
            connect_timeout: transport.connect_timeout,
            stream_wait: StreamOptions::default().connect_wait,
            eager_stream: true,
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.account.clone(), self.password.clone(), self.region.clone())
            .with_language(self.language.clone())
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
        }
    }

    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            connect_wait: self.stream_wait,
            ..StreamOptions::default()
        }
    }
}

fn default_auth_url() -> Url {
    Url::parse(DEFAULT_AUTH_URL).expect("default auth URL is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ControllerConfig::new("me@example.com", SecretString::from("pw".to_string()), "34");
        assert_eq!(config.auth_url.as_str(), DEFAULT_AUTH_URL);
        assert_eq!(config.language, "en");
        assert_eq!(config.stream_wait, Duration::from_secs(10));
        assert_eq!(config.transport().effective_timeout(), Duration::from_secs(90));
        assert!(config.eager_stream);
    }

    #[test]
    fn credentials_carry_language_and_region() {
        let mut config = ControllerConfig::new("me@example.com", SecretString::from("pw".to_string()), "+34");
        config.language = "es".into();

        let body = serde_json::to_value(config.credentials().login_request()).unwrap();
        assert_eq!(body["header"]["language"], "es");
        assert_eq!(body["header"]["calling_code"], "0034");
    }
}
