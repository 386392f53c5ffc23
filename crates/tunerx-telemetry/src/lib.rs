//! # tunerx Telemetry
//!
//! Structured logging and lightweight request counters shared by the tunerx
//! server and scoring job.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{InferenceMetrics, MetricsSnapshot, Timer};

/// Configuration for telemetry.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line.
    pub service_name: String,
    /// Log level (or full `EnvFilter` directive).
    pub log_level: String,
    /// Enable JSON logging.
    pub json_logs: bool,
}

impl TelemetryConfig {
    /// Creates a new telemetry configuration.
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Sets the log level.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enables JSON logging.
    #[must_use]
    pub fn with_json_logs(mut self) -> Self {
        self.json_logs = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_builder() {
        let config = TelemetryConfig::new("tunerx")
            .with_log_level("debug")
            .with_json_logs();
        assert_eq!(config.service_name, "tunerx");
        assert_eq!(config.log_level, "debug");
        assert!(config.json_logs);
    }
}
