/*!
Queries the Okta System Log for recent user deactivations
*/

use chrono::{DateTime, Utc};
use okta_syslog::{ClientError, DeactivationEvent, OktaClient};
use tracing::{debug, info};

/// Format Okta accepts for the `since` parameter
pub const SINCE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Start of the window `[now - lookback, now)`, formatted for the `since` parameter.
pub fn lookback_boundary(now: DateTime<Utc>, lookback: chrono::Duration) -> String {
    (now - lookback).format(SINCE_FORMAT).to_string()
}

/// Fetches deactivation events from a fixed trailing window
pub struct LogFetcher {
    lookback: chrono::Duration,
}

impl LogFetcher {
    pub fn new(lookback: chrono::Duration) -> Self {
        Self { lookback }
    }

    pub fn lookback(&self) -> chrono::Duration {
        self.lookback
    }

    /// Fetch the deactivations published in the window ending at `now`, in
    /// the order Okta returned them.
    pub async fn fetch(
        &self,
        client: &OktaClient,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeactivationEvent>, ClientError> {
        let since = lookback_boundary(now, self.lookback);
        debug!("Querying deactivations since {}", since);

        let events = client.deactivation_events(&since).await?;
        info!("Fetched {} deactivation events since {}", events.len(), since);

        Ok(events.into_iter().map(DeactivationEvent::from).collect())
    }
}
