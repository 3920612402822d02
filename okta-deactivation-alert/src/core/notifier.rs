/*!
Alert formatting and delivery
*/

use async_trait::async_trait;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use okta_syslog::DeactivationEvent;
use tracing::info;

use crate::core::config::{SmtpConfig, StartTls};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("no sender address configured (set ALERT_SENDER or SMTP_USERNAME)")]
    MissingSender,
    #[error("invalid email address '{address}': {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },
    #[error("failed to build email: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// A rendered alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl Notification {
    /// Render the alert for `event`. With a keyword the wording names the
    /// app the user had access to.
    pub fn for_event(event: &DeactivationEvent, keyword: Option<&str>) -> Self {
        let time = event.published.as_deref().unwrap_or("unknown");

        let (subject, intro) = match keyword {
            Some(keyword) => (
                format!("Okta Alert: {} User Deactivated ({})", keyword, event.user),
                format!("An Okta user with {} access has been deactivated.", keyword),
            ),
            None => (
                format!("Okta Alert: User Deactivated ({})", event.user),
                "An Okta user has been deactivated.".to_string(),
            ),
        };

        let body = format!(
            "{}\n\nUser: {}\nDeactivated by: {}\nTime: {}\n",
            intro, event.user, event.admin, time
        );

        Self { subject, body }
    }
}

/// Delivery channel for alerts
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Name of the channel, for logs
    fn name(&self) -> &'static str;

    /// Deliver one notification
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Pick the delivery channel for `smtp`. Without a recipient alerts go to the log.
pub fn from_config(smtp: &SmtpConfig) -> Result<Box<dyn Notifier>, NotifyError> {
    match smtp.recipient_address() {
        Some(recipient) => Ok(Box::new(SmtpNotifier::new(smtp, recipient)?)),
        None => Ok(Box::new(ConsoleNotifier)),
    }
}

/// Writes alerts to the log instead of mailing them
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!("Skipping email: ALERT_RECIPIENT not set.");
        info!("Subject: {}", notification.subject);
        info!("{}", notification.body.trim_end());
        Ok(())
    }
}

/// Sends alerts over SMTP with a STARTTLS upgrade
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Option<String>,
    recipient: String,
}

impl SmtpNotifier {
    /// Build the transport. No connection is made until the first send.
    pub fn new(smtp: &SmtpConfig, recipient: &str) -> Result<Self, NotifyError> {
        let tls_parameters = TlsParameters::new(smtp.server.clone())?;
        let tls = match smtp.starttls {
            StartTls::Required => Tls::Required(tls_parameters),
            StartTls::Opportunistic => Tls::Opportunistic(tls_parameters),
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp.server.as_str())
            .port(smtp.port)
            .tls(tls);

        if let (Some(username), Some(password)) = (&smtp.username, &smtp.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            sender: smtp.sender_address().map(str::to_string),
            recipient: recipient.to_string(),
        })
    }

    fn build_message(&self, notification: &Notification) -> Result<Message, NotifyError> {
        let sender = self.sender.as_deref().ok_or(NotifyError::MissingSender)?;

        let message = Message::builder()
            .from(parse_mailbox(sender)?)
            .to(parse_mailbox(&self.recipient)?)
            .subject(notification.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body.clone())?;

        Ok(message)
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.parse().map_err(|source| NotifyError::Address {
        address: address.to_string(),
        source,
    })
}

#[async_trait]
impl Notifier for SmtpNotifier {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let message = self.build_message(notification)?;
        self.transport.send(message).await?;
        info!("Email sent to {}", self.recipient);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bob() -> DeactivationEvent {
        DeactivationEvent {
            admin: "admin@x.com".to_string(),
            user: "bob@x.com".to_string(),
            user_id: Some("00u1".to_string()),
            published: Some("2024-01-01T00:00:00Z".to_string()),
        }
    }

    fn smtp_config() -> SmtpConfig {
        SmtpConfig {
            server: "smtp.example.com".to_string(),
            username: Some("alerts@x.com".to_string()),
            password: Some("pw".to_string()),
            recipient: Some("secops@x.com".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn keyword_alert_wording() {
        let notification = Notification::for_event(&bob(), Some("Salesforce"));
        assert_eq!(
            notification.subject,
            "Okta Alert: Salesforce User Deactivated (bob@x.com)"
        );
        assert_eq!(
            notification.body,
            "An Okta user with Salesforce access has been deactivated.\n\n\
             User: bob@x.com\n\
             Deactivated by: admin@x.com\n\
             Time: 2024-01-01T00:00:00Z\n"
        );
    }

    #[test]
    fn unfiltered_alert_wording() {
        let mut event = bob();
        event.published = None;

        let notification = Notification::for_event(&event, None);
        assert_eq!(notification.subject, "Okta Alert: User Deactivated (bob@x.com)");
        assert!(notification.body.starts_with("An Okta user has been deactivated.\n\n"));
        assert!(notification.body.ends_with("Time: unknown\n"));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn no_recipient_uses_console() {
        let smtp = SmtpConfig {
            recipient: None,
            ..smtp_config()
        };
        let notifier = from_config(&smtp).unwrap();
        assert_eq!(notifier.name(), "console");

        let notification = Notification::for_event(&bob(), Some("Salesforce"));
        assert!(notifier.send(&notification).await.is_ok());

        assert!(logs_contain("Skipping email: ALERT_RECIPIENT not set."));
        assert!(logs_contain(
            "Subject: Okta Alert: Salesforce User Deactivated (bob@x.com)"
        ));
        assert!(logs_contain("Deactivated by: admin@x.com"));
    }

    #[tokio::test]
    async fn blank_recipient_from_toml_uses_console() {
        let config: crate::core::config::AlertConfig = toml::from_str(
            r#"
[smtp]
username = "alerts@x.com"
recipient = ""
"#,
        )
        .unwrap();

        let notifier = from_config(&config.smtp).unwrap();
        assert_eq!(notifier.name(), "console");
        assert!(
            notifier
                .send(&Notification::for_event(&bob(), Some("Salesforce")))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn recipient_uses_smtp() {
        let notifier = from_config(&smtp_config()).unwrap();
        assert_eq!(notifier.name(), "smtp");
    }

    #[tokio::test]
    async fn message_carries_headers_and_body() {
        let notifier = SmtpNotifier::new(&smtp_config(), "secops@x.com").unwrap();
        let message = notifier
            .build_message(&Notification::for_event(&bob(), Some("Salesforce")))
            .unwrap();

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("From: alerts@x.com"));
        assert!(raw.contains("To: secops@x.com"));
        assert!(raw.contains("Subject: Okta Alert: Salesforce User Deactivated (bob@x.com)"));
        assert!(raw.contains("Deactivated by: admin@x.com"));
    }

    #[tokio::test]
    async fn missing_sender_fails_the_send() {
        let smtp = SmtpConfig {
            username: None,
            sender: None,
            ..smtp_config()
        };
        let notifier = SmtpNotifier::new(&smtp, "secops@x.com").unwrap();
        let err = notifier
            .send(&Notification::for_event(&bob(), None))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::MissingSender));
    }

    #[tokio::test]
    async fn bad_recipient_fails_the_send() {
        let notifier = SmtpNotifier::new(&smtp_config(), "not-an-address").unwrap();
        let err = notifier
            .send(&Notification::for_event(&bob(), None))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Address { .. }));
    }
}
