//! Bootstrap utilities for the broker binary.

use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogFormat, LogOutput, LoggingConfig, LOG_ENV_VAR};

/// Initialize tracing from the logging configuration.
///
/// `BROKER_LOG` takes precedence over the configured level. An invalid
/// directive falls back to "info".
pub fn init_tracing(config: &LoggingConfig) {
    tracing_subscriber::registry()
        .with(log_filter(&config.level))
        .with(fmt_layer(config))
        .init();
}

/// Filter from `BROKER_LOG`, else from `level`, else "info".
pub fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn fmt_layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = tracing_subscriber::fmt::layer();
    match (config.format, config.output) {
        (LogFormat::Text, LogOutput::Stdout) => layer.with_writer(std::io::stdout).boxed(),
        (LogFormat::Text, LogOutput::Stderr) => layer.with_writer(std::io::stderr).boxed(),
        (LogFormat::Json, LogOutput::Stdout) => layer.json().with_writer(std::io::stdout).boxed(),
        (LogFormat::Json, LogOutput::Stderr) => layer.json().with_writer(std::io::stderr).boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_log_filter_uses_configured_level() {
        std::env::remove_var(LOG_ENV_VAR);
        assert_eq!(log_filter("debug").to_string(), "debug");
    }

    #[test]
    #[serial]
    fn test_log_filter_env_overrides_level() {
        std::env::set_var(LOG_ENV_VAR, "warn");
        let filter = log_filter("debug");
        std::env::remove_var(LOG_ENV_VAR);
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    #[serial]
    fn test_log_filter_invalid_level_falls_back() {
        std::env::remove_var(LOG_ENV_VAR);
        assert_eq!(log_filter("activity_broker=loud").to_string(), "info");
    }
}
