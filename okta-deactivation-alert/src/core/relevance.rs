/*!
Decides whether a deactivated user is worth an alert, based on the apps they had assigned
*/

use okta_syslog::{ClientError, OktaClient};
use tracing::debug;

use crate::core::config::{DetectionConfig, FailurePolicy};

/// Matches a user's assigned app labels against a keyword
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    keyword: String,
    policy: FailurePolicy,
}

impl RelevanceFilter {
    pub fn new(keyword: impl Into<String>, policy: FailurePolicy) -> Self {
        Self {
            keyword: keyword.into(),
            policy,
        }
    }

    /// `None` when no keyword is configured and every deactivation should alert.
    pub fn from_config(config: &DetectionConfig) -> Option<Self> {
        config
            .keyword()
            .map(|keyword| Self::new(keyword, config.failure_policy))
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Whether `user_id` has an assigned app whose label contains the keyword.
    ///
    /// Lookup failures are returned as-is; use [`RelevanceFilter::resolve`] to
    /// apply the failure policy.
    pub async fn check(&self, client: &OktaClient, user_id: &str) -> Result<bool, ClientError> {
        let apps = client.assigned_apps(user_id).await?;

        match apps.iter().find(|app| app.label_contains(&self.keyword)) {
            Some(app) => {
                debug!(
                    "User {} has matching app {:?}",
                    user_id,
                    app.label.as_deref().unwrap_or_default()
                );
                Ok(true)
            }
            None => {
                debug!("User {} has {} apps, none matching {:?}", user_id, apps.len(), self.keyword);
                Ok(false)
            }
        }
    }

    /// Collapse a lookup result into a decision, falling back to the policy on error.
    pub fn resolve(&self, result: &Result<bool, ClientError>) -> bool {
        match result {
            Ok(relevant) => *relevant,
            Err(_) => self.policy.assume_relevant(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_with_apps(body: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/apps"))
            .and(query_param("filter", "user.id eq \"00u1\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    fn client_for(server: &MockServer) -> OktaClient {
        OktaClient::new(&server.uri(), "t", Duration::from_secs(10)).unwrap()
    }

    #[tokio::test]
    async fn matching_label_is_relevant() {
        let server = server_with_apps(serde_json::json!([
            {"label": "Slack"},
            {"label": "SALESFORCE Sandbox"}
        ]))
        .await;

        let filter = RelevanceFilter::new("Salesforce", FailurePolicy::FailClosed);
        assert!(filter.check(&client_for(&server), "00u1").await.unwrap());
    }

    #[tokio::test]
    async fn no_matching_label_is_not_relevant() {
        let server = server_with_apps(serde_json::json!([{"label": "Slack"}, {"id": "0oa9"}])).await;

        let filter = RelevanceFilter::new("Salesforce", FailurePolicy::FailClosed);
        assert!(!filter.check(&client_for(&server), "00u1").await.unwrap());
    }

    #[tokio::test]
    async fn lookup_failure_follows_policy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/apps"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let client = client_for(&server);

        let closed = RelevanceFilter::new("Salesforce", FailurePolicy::FailClosed);
        let result = closed.check(&client, "00u1").await;
        assert!(result.is_err());
        assert!(!closed.resolve(&result));

        let open = RelevanceFilter::new("Salesforce", FailurePolicy::FailOpen);
        assert!(open.resolve(&result));
    }

    #[test]
    fn blank_keyword_disables_filter() {
        let config = DetectionConfig {
            app_keyword: "  ".to_string(),
            ..Default::default()
        };
        assert!(RelevanceFilter::from_config(&config).is_none());

        let filter = RelevanceFilter::from_config(&DetectionConfig::default()).unwrap();
        assert_eq!(filter.keyword(), "Salesforce");
        assert_eq!(filter.policy(), FailurePolicy::FailClosed);
    }
}
