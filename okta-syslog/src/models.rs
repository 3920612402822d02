/*!
Wire models for Okta API responses.

Only the fields the alerter reads are modelled. Every field is optional so a
sparse or partially redacted log record still decodes.
*/

use serde::Deserialize;

/// A single System Log record as returned by `/api/v1/logs`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub published: Option<String>,
    #[serde(default)]
    pub actor: Option<LogActor>,
    #[serde(default)]
    pub target: Option<Vec<LogTarget>>,
}

/// The principal that performed the logged action
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogActor {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub alternate_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// An entity the logged action was applied to
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogTarget {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub alternate_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// An application returned by `/api/v1/apps`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppAssignment {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl AppAssignment {
    /// Whether the display label contains `keyword`, ignoring case.
    pub fn label_contains(&self, keyword: &str) -> bool {
        self.label
            .as_deref()
            .is_some_and(|label| label.to_lowercase().contains(&keyword.to_lowercase()))
    }
}

pub const UNKNOWN_ADMIN: &str = "Unknown admin";
pub const UNKNOWN_USER: &str = "Unknown user";

/// A user deactivation flattened out of a [`LogEvent`]
#[derive(Debug, Clone, PartialEq)]
pub struct DeactivationEvent {
    /// Alternate ID (usually the login email) of the admin who deactivated the user
    pub admin: String,
    /// Alternate ID of the deactivated user
    pub user: String,
    /// Okta internal user ID, needed for the app assignment lookup
    pub user_id: Option<String>,
    pub published: Option<String>,
}

impl From<LogEvent> for DeactivationEvent {
    fn from(event: LogEvent) -> Self {
        let admin = event
            .actor
            .and_then(|actor| actor.alternate_id)
            .unwrap_or_else(|| UNKNOWN_ADMIN.to_string());

        let target = event
            .target
            .and_then(|targets| targets.into_iter().next())
            .unwrap_or_default();

        Self {
            admin,
            user: target
                .alternate_id
                .unwrap_or_else(|| UNKNOWN_USER.to_string()),
            user_id: target.id,
            published: event.published,
        }
    }
}
