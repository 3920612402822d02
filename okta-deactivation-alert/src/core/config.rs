/*!
Configuration management for the deactivation alerter

Values are layered: built-in defaults, then an optional TOML file, then
environment variables. CLI flags are applied on top by `main`.
*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("OKTA_API_TOKEN environment variable is not set")]
    MissingToken,
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Okta org and System Log query settings
    pub okta: OktaConfig,
    /// Which deactivations are worth an alert
    pub detection: DetectionConfig,
    /// Mail delivery settings
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OktaConfig {
    /// Base URL of the Okta org, e.g. `https://acme.okta.com`
    pub org_url: String,
    /// SSWS API token; required
    pub api_token: Option<String>,
    /// Trailing window searched on each run, in minutes
    pub lookback_minutes: u32,
    /// Timeout applied to every Okta API request, in seconds
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Only alert for users with an assigned app whose label contains this
    /// (case-insensitive). Empty alerts on every deactivation.
    pub app_keyword: String,
    /// What to do when the app assignment lookup fails
    pub failure_policy: FailurePolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Treat the user as not relevant and send nothing
    #[default]
    FailClosed,
    /// Treat the user as relevant and alert anyway
    FailOpen,
}

impl FailurePolicy {
    /// Relevance assumed when the lookup could not be completed.
    pub fn assume_relevant(self) -> bool {
        matches!(self, FailurePolicy::FailOpen)
    }
}

impl std::str::FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail-closed" | "closed" => Ok(FailurePolicy::FailClosed),
            "fail-open" | "open" => Ok(FailurePolicy::FailOpen),
            _ => Err(ConfigError::InvalidValue {
                key: "ALERT_FAILURE_POLICY",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub starttls: StartTls,
    /// From address; falls back to `username`
    pub sender: Option<String>,
    /// Single recipient. When unset alerts are only logged.
    pub recipient: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartTls {
    #[default]
    Required,
    Opportunistic,
}

impl std::str::FromStr for StartTls {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "required" => Ok(StartTls::Required),
            "opportunistic" => Ok(StartTls::Opportunistic),
            _ => Err(ConfigError::InvalidValue {
                key: "SMTP_STARTTLS",
                value: s.to_string(),
            }),
        }
    }
}

impl Default for OktaConfig {
    fn default() -> Self {
        Self {
            org_url: "https://your-org.okta.com".to_string(),
            api_token: None,
            lookback_minutes: 5,
            http_timeout_secs: 10,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            app_keyword: "Salesforce".to_string(),
            failure_policy: FailurePolicy::FailClosed,
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            server: "smtp.gmail.com".to_string(),
            port: 587,
            username: None,
            password: None,
            starttls: StartTls::Required,
            sender: None,
            recipient: None,
        }
    }
}

impl OktaConfig {
    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.lookback_minutes))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl DetectionConfig {
    /// The keyword to filter on, or `None` when every deactivation is alerted.
    pub fn keyword(&self) -> Option<&str> {
        let keyword = self.app_keyword.trim();
        (!keyword.is_empty()).then_some(keyword)
    }
}

impl SmtpConfig {
    /// From address, falling back to `username`. Blank values count as unset.
    pub fn sender_address(&self) -> Option<&str> {
        non_blank(self.sender.as_deref()).or(non_blank(self.username.as_deref()))
    }

    /// The alert recipient, or `None` when it is unset or blank.
    pub fn recipient_address(&self) -> Option<&str> {
        non_blank(self.recipient.as_deref())
    }

    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

impl AlertConfig {
    /// Read a TOML config file. Missing sections and keys take their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay values from environment variables looked up through `var`.
    ///
    /// Empty values count as unset, except `ALERT_APP_KEYWORD` where an
    /// empty string turns the app filter off.
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("OKTA_ORG_URL") {
            self.okta.org_url = v;
        }
        if let Some(v) = non_empty("OKTA_API_TOKEN") {
            self.okta.api_token = Some(v);
        }
        if let Some(v) = non_empty("ALERT_LOOKBACK_MINUTES") {
            self.okta.lookback_minutes = parse_number("ALERT_LOOKBACK_MINUTES", &v)?;
        }
        if let Some(v) = non_empty("OKTA_HTTP_TIMEOUT_SECS") {
            self.okta.http_timeout_secs = parse_number("OKTA_HTTP_TIMEOUT_SECS", &v)?;
        }

        if let Some(v) = var("ALERT_APP_KEYWORD") {
            self.detection.app_keyword = v;
        }
        if let Some(v) = non_empty("ALERT_FAILURE_POLICY") {
            self.detection.failure_policy = v.parse()?;
        }

        if let Some(v) = non_empty("SMTP_SERVER") {
            self.smtp.server = v;
        }
        if let Some(v) = non_empty("SMTP_PORT") {
            self.smtp.port = parse_number("SMTP_PORT", &v)?;
        }
        if let Some(v) = non_empty("SMTP_USERNAME") {
            self.smtp.username = Some(v);
        }
        if let Some(v) = non_empty("SMTP_PASSWORD") {
            self.smtp.password = Some(v);
        }
        if let Some(v) = non_empty("SMTP_STARTTLS") {
            self.smtp.starttls = v.parse()?;
        }
        if let Some(v) = non_empty("ALERT_SENDER") {
            self.smtp.sender = Some(v);
        }
        if let Some(v) = non_empty("ALERT_RECIPIENT") {
            self.smtp.recipient = Some(v);
        }

        Ok(())
    }

    /// Reject configurations that cannot run. Incomplete SMTP credentials
    /// only produce a warning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .okta
            .api_token
            .as_deref()
            .is_none_or(|token| token.trim().is_empty())
        {
            return Err(ConfigError::MissingToken);
        }
        if self.okta.lookback_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "lookback_minutes",
                value: "0".to_string(),
            });
        }
        if self.okta.http_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "http_timeout_secs",
                value: "0".to_string(),
            });
        }

        if !self.smtp.has_credentials() {
            warn!("SMTP_USERNAME or SMTP_PASSWORD not set. Email alerts might fail.");
        }

        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

/// `<config dir>/okta-deactivation-alert/config.toml`, e.g.
/// `~/.config/okta-deactivation-alert/config.toml` on Linux
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("okta-deactivation-alert").join("config.toml"))
}

/// Build the configuration from an explicit file (or the default file, if it
/// exists) and the process environment.
pub fn load(config_path: Option<&Path>) -> Result<AlertConfig, ConfigError> {
    let file = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|path| path.exists()),
    };

    let mut config = match file {
        Some(path) => {
            debug!("Loading configuration from {:?}", path);
            AlertConfig::from_toml_file(&path)?
        }
        None => AlertConfig::default(),
    };

    config.apply_env(|key| std::env::var(key).ok())?;
    Ok(config)
}
