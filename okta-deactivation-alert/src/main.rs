/*!
Okta Deactivation Alert

Checks the Okta System Log for recent user deactivations and emails an alert
for each one. Meant to be run on a schedule; every invocation performs one check.
*/

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{Arg, ArgAction, ArgMatches, Command, crate_version, value_parser};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::core::config::{self, AlertConfig, ConfigError, FailurePolicy};
use crate::core::tracker::DeactivationTracker;

mod core;

fn cli() -> Command {
    Command::new("Okta Deactivation Alert")
        .version(crate_version!())
        .about("Emails an alert when Okta users are deactivated")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Path to a TOML config file")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("org-url")
                .long("org-url")
                .help("Okta org URL (overrides OKTA_ORG_URL)")
                .value_name("URL"),
        )
        .arg(
            Arg::new("lookback-minutes")
                .short('l')
                .long("lookback-minutes")
                .help("How far back to search the System Log")
                .value_name("MINUTES")
                .value_parser(value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new("app-keyword")
                .short('k')
                .long("app-keyword")
                .help("Only alert for users with an assigned app whose label contains this")
                .value_name("KEYWORD")
                .conflicts_with("all-deactivations"),
        )
        .arg(
            Arg::new("all-deactivations")
                .long("all-deactivations")
                .help("Alert on every deactivation, skipping the app check")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("fail-open")
                .long("fail-open")
                .help("Alert anyway when the app check fails")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("recipient")
                .short('r')
                .long("recipient")
                .help("Alert recipient (overrides ALERT_RECIPIENT)")
                .value_name("EMAIL"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log at debug level")
                .action(ArgAction::SetTrue),
        )
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Defaults, config file and environment, then command line flags on top.
fn load_config(matches: &ArgMatches) -> Result<AlertConfig, ConfigError> {
    let mut config = config::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;

    if let Some(url) = matches.get_one::<String>("org-url") {
        config.okta.org_url = url.clone();
    }
    if let Some(minutes) = matches.get_one::<u32>("lookback-minutes") {
        config.okta.lookback_minutes = *minutes;
    }
    if let Some(keyword) = matches.get_one::<String>("app-keyword") {
        config.detection.app_keyword = keyword.clone();
    }
    if matches.get_flag("all-deactivations") {
        config.detection.app_keyword.clear();
    }
    if matches.get_flag("fail-open") {
        config.detection.failure_policy = FailurePolicy::FailOpen;
    }
    if let Some(recipient) = matches.get_one::<String>("recipient") {
        config.smtp.recipient = Some(recipient.clone());
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let matches = cli().get_matches();

    dotenvy::dotenv().ok();
    init_tracing(matches.get_flag("verbose"));

    let config = match load_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            error!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Starting Okta deactivation check...");

    let tracker = match DeactivationTracker::new(&config) {
        Ok(tracker) => tracker,
        Err(e) => {
            error!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = tracker.run(Utc::now()).await {
        error!("Error fetching logs from Okta: {}", e);
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn flags_parse() {
        let matches = cli()
            .try_get_matches_from([
                "okta-deactivation-alert",
                "--lookback-minutes",
                "15",
                "--all-deactivations",
                "--fail-open",
                "-r",
                "secops@x.com",
            ])
            .unwrap();

        assert_eq!(matches.get_one::<u32>("lookback-minutes"), Some(&15));
        assert!(matches.get_flag("all-deactivations"));
        assert!(matches.get_flag("fail-open"));
        assert_eq!(
            matches.get_one::<String>("recipient").map(String::as_str),
            Some("secops@x.com")
        );
    }

    #[test]
    fn keyword_conflicts_with_all_deactivations() {
        let result = cli().try_get_matches_from([
            "okta-deactivation-alert",
            "--app-keyword",
            "Workday",
            "--all-deactivations",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn zero_lookback_is_rejected() {
        let result =
            cli().try_get_matches_from(["okta-deactivation-alert", "--lookback-minutes", "0"]);
        assert!(result.is_err());
    }
}
