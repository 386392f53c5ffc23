//! Structured logging configuration.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::TelemetryConfig;

/// HTTP stack crates that log every connection at `debug`.
const QUIET_TARGETS: [&str; 4] = ["hyper", "hyper_util", "reqwest", "h2"];

/// Builds the filter directive for a configured level.
///
/// The HTTP stack stays at `warn` unless the level names one of its crates.
#[must_use]
pub fn filter_directives(level: &str) -> String {
    let level = level.trim();
    let level = if level.is_empty() { "info" } else { level };

    QUIET_TARGETS
        .iter()
        .filter(|target| !level.contains(&format!("{target}=")))
        .fold(level.to_string(), |acc, target| format!("{acc},{target}=warn"))
}

/// Initializes logging based on configuration.
///
/// `RUST_LOG` takes precedence over the configured level. Calling this twice
/// leaves the first subscriber in place.
pub fn init_logging(config: &TelemetryConfig) {
    let directives = filter_directives(&config.log_level);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directives));

    let fmt_layer = fmt::layer().with_target(true).with_thread_ids(false);
    let installed = if config.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json().with_span_events(FmtSpan::CLOSE))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.compact())
            .try_init()
    };

    if installed.is_err() {
        tracing::debug!("Global subscriber already set, keeping it");
        return;
    }

    tracing::info!(
        service = %config.service_name,
        filter = %directives,
        json = config.json_logs,
        "Logging initialized"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiets_http_stack() {
        assert_eq!(
            filter_directives("debug"),
            "debug,hyper=warn,hyper_util=warn,reqwest=warn,h2=warn"
        );
        assert!(filter_directives("  ").starts_with("info,"));
    }

    #[test]
    fn test_explicit_target_wins() {
        let directives = filter_directives("info,reqwest=trace");
        assert!(directives.contains("reqwest=trace"));
        assert!(!directives.contains("reqwest=warn"));
        assert!(directives.contains("hyper=warn"));
    }

    #[test]
    fn test_double_init_is_harmless() {
        let config = TelemetryConfig::new("tunerx-test");
        init_logging(&config);
        init_logging(&config.with_json_logs());
    }
}
