/*!
Runs one deactivation check: fetch, filter, notify
*/

use chrono::{DateTime, Utc};
use okta_syslog::{ClientError, DeactivationEvent, OktaClient};
use tracing::{error, info};

use crate::core::{
    config::AlertConfig,
    log_fetcher::LogFetcher,
    notifier::{self, Notification, Notifier},
    relevance::RelevanceFilter,
};

/// Coordinates the fetcher, the optional relevance filter and the notifier
pub struct DeactivationTracker {
    client: OktaClient,
    fetcher: LogFetcher,
    filter: Option<RelevanceFilter>,
    notifier: Box<dyn Notifier>,
}

/// Counters for a single run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub events_fetched: usize,
    pub skipped_missing_user_id: usize,
    pub skipped_not_relevant: usize,
    pub relevance_check_failures: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
}

impl DeactivationTracker {
    /// Build the Okta client and the notifier described by `config`.
    pub fn new(config: &AlertConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let client = OktaClient::new(
            &config.okta.org_url,
            config.okta.api_token.as_deref().unwrap_or_default(),
            config.okta.http_timeout(),
        )?;
        let notifier = notifier::from_config(&config.smtp)?;

        info!("Okta org: {}", client.base_url());
        info!("Alert channel: {}", notifier.name());

        Ok(Self::with_parts(
            client,
            LogFetcher::new(config.okta.lookback()),
            RelevanceFilter::from_config(&config.detection),
            notifier,
        ))
    }

    pub fn with_parts(
        client: OktaClient,
        fetcher: LogFetcher,
        filter: Option<RelevanceFilter>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        match &filter {
            Some(filter) => info!(
                "Alerting on deactivated users with a {:?} app ({:?} on lookup errors)",
                filter.keyword(),
                filter.policy()
            ),
            None => info!("Alerting on every deactivation"),
        }

        Self {
            client,
            fetcher,
            filter,
            notifier,
        }
    }

    /// Check the window ending at `now` and send an alert for each relevant
    /// deactivation.
    ///
    /// A failed log fetch abandons the run and is returned. Failures on
    /// individual events are logged and counted in the summary.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunSummary, ClientError> {
        let events = self.fetcher.fetch(&self.client, now).await?;

        let mut summary = RunSummary {
            events_fetched: events.len(),
            ..Default::default()
        };

        if events.is_empty() {
            info!(
                "No deactivations found in the last {} minutes.",
                self.fetcher.lookback().num_minutes()
            );
            return Ok(summary);
        }

        for event in events {
            self.handle_event(event, &mut summary).await;
        }

        info!(
            "Check complete: {} fetched, {} alerted, {} failed, {} not relevant, {} without user ID, {} app lookups failed",
            summary.events_fetched,
            summary.notifications_sent,
            summary.notifications_failed,
            summary.skipped_not_relevant,
            summary.skipped_missing_user_id,
            summary.relevance_check_failures
        );

        Ok(summary)
    }

    async fn handle_event(&self, event: DeactivationEvent, summary: &mut RunSummary) {
        let keyword = self.filter.as_ref().map(|filter| filter.keyword());

        if let Some(filter) = &self.filter {
            let Some(user_id) = event.user_id.as_deref() else {
                info!(
                    "Could not find user ID for {}, skipping {} check.",
                    event.user,
                    filter.keyword()
                );
                summary.skipped_missing_user_id += 1;
                return;
            };

            let result = filter.check(&self.client, user_id).await;
            if let Err(e) = &result {
                error!("Error checking apps for user {}: {}", user_id, e);
                summary.relevance_check_failures += 1;
            }

            if !filter.resolve(&result) {
                info!(
                    "User {} deactivated, but does not have {} assigned. Skipping alert.",
                    event.user,
                    filter.keyword()
                );
                summary.skipped_not_relevant += 1;
                return;
            }
        }

        info!(
            "DETECTED: {}user {} deactivated by {} at {}",
            keyword.map(|k| format!("{} ", k)).unwrap_or_default(),
            event.user,
            event.admin,
            event.published.as_deref().unwrap_or("unknown")
        );

        let notification = Notification::for_event(&event, keyword);
        match self.notifier.send(&notification).await {
            Ok(()) => summary.notifications_sent += 1,
            Err(e) => {
                error!("Failed to send alert for {}: {}", event.user, e);
                summary.notifications_failed += 1;
            }
        }
    }
}
