/*!
Client and wire models for the parts of the Okta management API used to
watch for user deactivations: the System Log (`/api/v1/logs`) and the
application assignment listing (`/api/v1/apps`).
*/

pub mod client;
pub mod error;
pub mod models;

pub use client::{DEACTIVATION_EVENT_TYPE, LOG_PAGE_LIMIT, OktaClient};
pub use error::ClientError;
pub use models::{AppAssignment, DeactivationEvent, LogActor, LogEvent, LogTarget};
