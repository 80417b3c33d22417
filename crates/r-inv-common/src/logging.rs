//! ---
//! inv_section: "01-core-functionality"
//! inv_subsection: "module"
//! inv_type: "source"
//! inv_scope: "code"
//! inv_description: "Shared configuration and tracing setup."
//! inv_version: "v0.0.0-prealpha"
//! inv_owner: "tbd"
//! ---
//! Process-wide tracing for applications embedding an inventory client.
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "R_INV_LOG";
const DEFAULT_DIRECTIVE: &str = "info";
const DEFAULT_FILE_PREFIX: &str = "r-inv";

static GUARDS: OnceCell<(WorkerGuard, WorkerGuard)> = OnceCell::new();

/// Stdout formats. The rolling file is always JSON.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
    /// One line per event, for terminals watching long waits.
    Compact,
}

/// Base name of the rolling log file for `client`; the appender adds the date.
pub fn log_file_name(client: &str, config: &LoggingConfig) -> String {
    let prefix = config.file_prefix.as_deref().unwrap_or(DEFAULT_FILE_PREFIX);
    format!("{prefix}-{client}.log")
}

fn log_filter() -> EnvFilter {
    if let Ok(directive) = std::env::var(LOG_ENV) {
        match EnvFilter::try_new(&directive) {
            Ok(filter) => return filter,
            Err(err) => eprintln!("ignoring {LOG_ENV}={directive:?} ({err})"),
        }
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber for `client`.
///
/// The filter comes from `R_INV_LOG`, then `RUST_LOG`, then `info`. Stdout
/// follows [`LoggingConfig::format`] and a daily JSON file named by
/// [`log_file_name`] is kept under [`LoggingConfig::directory`]. Only the
/// first call installs anything; later calls still create the directory.
pub fn init_tracing(client: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory).with_context(|| {
        format!("creating log directory {}", config.directory.display())
    })?;
    if GUARDS.get().is_some() {
        return Ok(());
    }

    let file_name = log_file_name(client, config);
    let (file_writer, file_guard) =
        tracing_appender::non_blocking(daily(&config.directory, &file_name));
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    let stdout_layer = match config.format {
        LogFormat::StructuredJson => fmt::layer()
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .json()
            .with_current_span(false)
            .with_writer(stdout_writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(stdout_writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(stdout_writer)
            .boxed(),
    };
    let file_layer = fmt::layer()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .json()
        .with_writer(file_writer)
        .boxed();

    let installed = tracing_subscriber::registry()
        .with(log_filter())
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .is_ok();
    let _ = GUARDS.set((file_guard, stdout_guard));

    info!(
        client,
        file = %config.directory.join(&file_name).display(),
        format = ?config.format,
        installed,
        "inventory client tracing ready"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_uses_prefix_or_default() {
        let mut config = LoggingConfig::default();
        assert_eq!(log_file_name("waiter", &config), "r-inv-waiter.log");
        config.file_prefix = Some("lab".into());
        assert_eq!(log_file_name("waiter", &config), "lab-waiter.log");
    }

    #[test]
    fn formats_parse_from_kebab_case() {
        #[derive(Deserialize)]
        struct Section {
            format: LogFormat,
        }
        let section: Section = toml::from_str(r#"format = "compact""#).expect("parse");
        assert_eq!(section.format, LogFormat::Compact);
    }
}
