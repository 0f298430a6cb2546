// Device registry
//
// Lists the robots bound to the account through the authenticated API
// endpoint. The cloud's list is returned as-is, in server order, with
// each device's bootstrap status blob.

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::auth::Session;
use crate::error::{Error, preview};
use crate::protocol::StatusBlob;

/// A device bound to the account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Stable vendor-assigned identifier.
    pub thing_name: String,

    /// User-facing display name.
    #[serde(default)]
    pub thing_nickname: String,

    /// Device sub-type, echoed back in every command.
    #[serde(default)]
    pub sub_type: String,

    /// Last status known to the cloud at list time.
    #[serde(default)]
    pub thing_status: StatusBlob,

    /// Everything else the cloud sends about the device.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl DeviceDescriptor {
    /// Nickname if set, otherwise the thing name.
    pub fn display_name(&self) -> &str {
        if self.thing_nickname.is_empty() {
            &self.thing_name
        } else {
            &self.thing_nickname
        }
    }
}

#[derive(Deserialize)]
struct ListResponse {
    msg: String,
    #[serde(default)]
    data: Option<ListData>,
}

#[derive(Deserialize)]
struct ListData {
    #[serde(default)]
    thing_list: Vec<DeviceDescriptor>,
}

/// Resolves the devices bound to an account.
pub struct DeviceRegistry {
    http: reqwest::Client,
}

impl DeviceRegistry {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Fetch the full device list in one call. No paging, no filtering.
    pub async fn list(&self, session: &Session) -> Result<Vec<DeviceDescriptor>, Error> {
        debug!(url = %session.api_url, "listing devices");

        let resp = self
            .http
            .post(session.api_url.clone())
            .header("Token", session.token.expose_secret())
            .header("Region", &session.region_name)
            .json(&serde_json::json!({ "opt": "user_thing_list_get" }))
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::SessionExpired);
        }

        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Api {
                message: format!("HTTP {status}: {}", preview(&body)),
            });
        }

        let parsed: ListResponse = serde_json::from_str(&body).map_err(|e| {
            Error::Deserialization {
                message: format!("{e} (body preview: {:?})", preview(&body)),
                body: body.clone(),
            }
        })?;

        if parsed.msg != "success" {
            return Err(Error::Api {
                message: format!("device list rejected: {}", parsed.msg),
            });
        }

        let devices = parsed.data.map(|d| d.thing_list).unwrap_or_default();
        debug!(count = devices.len(), "device list received");
        Ok(devices)
    }
}
