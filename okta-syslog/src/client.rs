/*!
HTTP client for the Okta management API
*/

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ClientError;
use crate::models::{AppAssignment, LogEvent};

/// System Log event type emitted when a user is deactivated
pub const DEACTIVATION_EVENT_TYPE: &str = "user.lifecycle.deactivate";

/// Page size requested from the System Log. Only the first page is read.
pub const LOG_PAGE_LIMIT: u32 = 50;

/// Authenticated client bound to a single Okta org
pub struct OktaClient {
    client: Client,
    base_url: String,
    api_token: String,
}

impl fmt::Debug for OktaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OktaClient")
            .field("base_url", &self.base_url)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

impl OktaClient {
    /// Create a client for `org_url` using an SSWS API token.
    ///
    /// `timeout` bounds every request made through this client.
    pub fn new(org_url: &str, api_token: &str, timeout: Duration) -> Result<Self, ClientError> {
        url::Url::parse(org_url).map_err(|source| ClientError::InvalidUrl {
            url: org_url.to_string(),
            source,
        })?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: org_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the first page of user deactivation events published at or after `since`.
    ///
    /// `since` is passed through verbatim, so it must already be an ISO-8601
    /// UTC timestamp Okta accepts.
    pub async fn deactivation_events(&self, since: &str) -> Result<Vec<LogEvent>, ClientError> {
        let filter = format!("eventType eq \"{}\"", DEACTIVATION_EVENT_TYPE);
        self.get_json(
            "/api/v1/logs",
            &[
                ("filter", filter),
                ("since", since.to_string()),
                ("limit", LOG_PAGE_LIMIT.to_string()),
            ],
        )
        .await
    }

    /// List the applications assigned to the user with Okta ID `user_id`.
    pub async fn assigned_apps(&self, user_id: &str) -> Result<Vec<AppAssignment>, ClientError> {
        let filter = format!("user.id eq \"{}\"", user_id);
        self.get_json("/api/v1/apps", &[("filter", filter)]).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("SSWS {}", self.api_token))
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status { status, url });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|source| ClientError::Decode { url, source })
    }
}
