// Cloud authentication
//
// Account credentials, the login request descriptor, and the session
// (bearer token + endpoints) handed out by the WeBack auth service.
// The password only ever leaves the process as an MD5 hex digest.

use std::sync::RwLock;

use md5::{Digest, Md5};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, preview};
use crate::transport::TransportConfig;

/// Production login endpoint.
pub const DEFAULT_AUTH_URL: &str = "https://user.grit-cloud.com/prod/oauth";

const APP_NAME: &str = "WeBack";
const API_VERSION: &str = "1.0";
const CLIENT_ID: &str = "yugong_app";
const DEFAULT_LANGUAGE: &str = "en";

// ── Credentials ─────────────────────────────────────────────────────

/// Account credentials for the WeBack cloud.
///
/// Immutable once built. `region` is the international calling code of
/// the account's country (`"34"`, `"+34"` and `"0034"` are equivalent).
#[derive(Debug, Clone)]
pub struct Credentials {
    account: String,
    password: SecretString,
    region: String,
    language: String,
}

impl Credentials {
    pub fn new(account: impl Into<String>, password: SecretString, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            password,
            region: region.into(),
            language: DEFAULT_LANGUAGE.into(),
        }
    }

    /// Override the language the cloud answers in.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Calling code in the `00<code>` form the login header expects.
    pub fn calling_code(&self) -> String {
        let code = self.region.trim().trim_start_matches('+');
        if code.starts_with("00") {
            code.to_owned()
        } else {
            format!("00{code}")
        }
    }

    /// Lowercase hex MD5 of the password.
    pub fn password_digest(&self) -> String {
        hex::encode(Md5::digest(self.password.expose_secret().as_bytes()))
    }

    /// Build the login request body.
    pub fn login_request(&self) -> LoginRequest {
        LoginRequest {
            payload: LoginPayload {
                opt: "login",
                pwd: self.password_digest(),
            },
            header: LoginHeader {
                language: self.language.clone(),
                app_name: APP_NAME,
                calling_code: self.calling_code(),
                api_version: API_VERSION,
                account: self.account.clone(),
                client_id: CLIENT_ID,
            },
        }
    }
}

/// Body of `POST <auth url>`.
#[derive(Serialize)]
pub struct LoginRequest {
    payload: LoginPayload,
    header: LoginHeader,
}

#[derive(Serialize)]
struct LoginPayload {
    opt: &'static str,
    pwd: String,
}

#[derive(Serialize)]
struct LoginHeader {
    language: String,
    app_name: &'static str,
    calling_code: String,
    api_version: &'static str,
    account: String,
    client_id: &'static str,
}

// ── Session ─────────────────────────────────────────────────────────

/// Result of a successful login.
///
/// Cheap to clone; consumers keep read-only copies.
#[derive(Debug, Clone)]
pub struct Session {
    /// Bearer token (`jwt_token`).
    pub token: SecretString,
    /// Cloud region name, sent back as the `Region`/`region` header.
    pub region_name: String,
    /// Request/response endpoint for authenticated calls.
    pub api_url: Url,
    /// Persistent stream endpoint.
    pub stream_url: Url,
}

#[derive(Deserialize)]
struct LoginResponse {
    msg: String,
    #[serde(default)]
    data: Option<LoginData>,
}

#[derive(Deserialize)]
struct LoginData {
    jwt_token: String,
    region_name: String,
    wss_url: String,
    api_url: String,
}

impl TryFrom<LoginData> for Session {
    type Error = Error;

    fn try_from(data: LoginData) -> Result<Self, Self::Error> {
        let invalid = |field: &str, e: url::ParseError| Error::Authentication {
            message: format!("login response has an invalid {field}: {e}"),
        };
        Ok(Self {
            api_url: Url::parse(&data.api_url).map_err(|e| invalid("api_url", e))?,
            stream_url: Url::parse(&data.wss_url).map_err(|e| invalid("wss_url", e))?,
            token: SecretString::from(data.jwt_token),
            region_name: data.region_name,
        })
    }
}

// ── AuthSession ─────────────────────────────────────────────────────

/// Exchanges credentials for a [`Session`] and keeps the current one.
///
/// Never retries on its own; callers decide whether a failed login
/// should be attempted again.
pub struct AuthSession {
    http: reqwest::Client,
    auth_url: Url,
    credentials: Credentials,
    session: RwLock<Option<Session>>,
}

impl AuthSession {
    pub fn new(
        credentials: Credentials,
        auth_url: Url,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Ok(Self::with_client(transport.build_client()?, credentials, auth_url))
    }

    /// Create an auth session around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, credentials: Credentials, auth_url: Url) -> Self {
        Self {
            http,
            auth_url,
            credentials,
            session: RwLock::new(None),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// The underlying HTTP client, shared with the device registry.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// A copy of the current session, if logged in.
    pub fn session(&self) -> Option<Session> {
        self.session.read().expect("session lock poisoned").clone()
    }

    /// Forget the current session (e.g. after the token was rejected).
    pub fn invalidate(&self) {
        debug!("invalidating session");
        *self.session.write().expect("session lock poisoned") = None;
    }

    /// Log in and store the resulting session.
    pub async fn login(&self) -> Result<Session, Error> {
        debug!(account = %self.credentials.account, url = %self.auth_url, "logging in");

        let resp = self
            .http
            .post(self.auth_url.clone())
            .json(&self.credentials.login_request())
            .send()
            .await
            .map_err(|e| Error::Authentication {
                message: format!("login request failed: {e}"),
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Authentication {
            message: format!("failed to read login response: {e}"),
        })?;

        if !status.is_success() {
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status}): {}", preview(&body)),
            });
        }

        let parsed: LoginResponse = serde_json::from_str(&body).map_err(|e| Error::Authentication {
            message: format!("unreadable login response: {e} (body preview: {:?})", preview(&body)),
        })?;

        if parsed.msg != "success" {
            return Err(Error::Authentication {
                message: format!("login rejected: {} -- verify account, password and region", parsed.msg),
            });
        }

        let data = parsed.data.ok_or_else(|| Error::Authentication {
            message: "login response has no data".into(),
        })?;
        let session = Session::try_from(data)?;

        info!(region = %session.region_name, "login successful");
        *self.session.write().expect("session lock poisoned") = Some(session.clone());
        Ok(session)
    }

    /// Drop the current session and log in again.
    pub async fn reauthenticate(&self) -> Result<Session, Error> {
        self.invalidate();
        self.login().await
    }
}
