// Mode-control HTTP client
//
// Out-of-band request/response calls that flip a unit into or out of
// emergency and maintenance mode. The controller answers with a bare
// status; the authoritative mode change only shows up in a later fleet
// snapshot, so success here means "accepted", nothing more.

use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Default path prefix of the control endpoints.
pub const DEFAULT_CONTROL_PREFIX: &str = "/api/elevator";

/// HTTP client for the emergency/maintenance endpoints.
///
/// Cheap to clone: `reqwest::Client` is reference-counted internally.
#[derive(Debug, Clone)]
pub struct ControlClient {
    http: reqwest::Client,
    base_url: Url,
    prefix: String,
}

impl ControlClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the controller root (e.g. `https://lifts.example.com`).
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a control client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            prefix: DEFAULT_CONTROL_PREFIX.to_owned(),
        }
    }

    /// Override the endpoint path prefix (default `/api/elevator`).
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Mode control ─────────────────────────────────────────────────

    /// `POST {prefix}/emergency?elevatorId={id}`
    pub async fn trigger_emergency(&self, elevator_id: u32) -> Result<(), Error> {
        let id = elevator_id.to_string();
        self.post_action("emergency", &[("elevatorId", id.as_str())])
            .await
    }

    /// `POST {prefix}/clearEmergency?elevatorId={id}`
    pub async fn clear_emergency(&self, elevator_id: u32) -> Result<(), Error> {
        let id = elevator_id.to_string();
        self.post_action("clearEmergency", &[("elevatorId", id.as_str())])
            .await
    }

    /// `POST {prefix}/maintenance?elevatorId={id}&enable={bool}`
    pub async fn set_maintenance(&self, elevator_id: u32, enable: bool) -> Result<(), Error> {
        let id = elevator_id.to_string();
        let enable = if enable { "true" } else { "false" };
        self.post_action("maintenance", &[("elevatorId", id.as_str()), ("enable", enable)])
            .await
    }

    // ── Transport mechanics ──────────────────────────────────────────

    fn action_url(&self, action: &str, query: &[(&str, &str)]) -> Result<Url, Error> {
        let path = format!("{}/{action}", self.prefix.trim_end_matches('/'));
        let mut url = self.base_url.join(&path)?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url)
    }

    async fn post_action(&self, action: &str, query: &[(&str, &str)]) -> Result<(), Error> {
        let url = self.action_url(action, query)?;
        debug!(%url, "POST control action");

        let response = self.http.post(url).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_owned()
        } else {
            body.trim().to_owned()
        };
        Err(Error::Control {
            status: status.as_u16(),
            message,
        })
    }
}
