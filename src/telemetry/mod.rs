//! Telemetry and metrics for the human-loop service
//!
//! This module provides tracing initialization and lightweight metric
//! emission for query lifecycle events. Metrics are emitted as structured
//! tracing events under the `metrics` target so any subscriber can collect
//! them without a dedicated exporter.

use std::collections::HashMap;

/// Configuration for the telemetry system
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Name of the service
    pub service_name: String,
    /// Enable console output
    pub enable_console: bool,
    /// Log level
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "human-loop".to_string(),
            enable_console: true,
            log_level: "info".to_string(),
        }
    }
}

/// Initialize telemetry for the specified service with configuration options
pub fn init_telemetry(
    config: TelemetryConfig,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let builder = tracing_subscriber::fmt().with_env_filter(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level)),
    );

    if config.enable_console {
        builder.with_target(true).with_ansi(true).init();
    } else {
        builder.init();
    }

    Ok(())
}

/// Add a single metric with tags to the telemetry system
pub fn add_metric(name: &str, value: f64, tags: &[(&str, String)]) {
    let tags_str = tags
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",");

    tracing::info!(
        target: "metrics",
        metric_name = %name,
        metric_value = %value,
        metric_tags = %tags_str,
        "Recorded metric"
    );
}

/// Add multiple metrics at once
pub fn add_metrics(metrics: HashMap<&'static str, f64>) {
    for (name, value) in metrics {
        add_metric(name, value, &[]);
    }
}
