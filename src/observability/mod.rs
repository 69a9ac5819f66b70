// src/observability/mod.rs
//! Logging and metrics setup
//!
//! Library code only emits through the `tracing` and `metrics` facades;
//! binaries call these once at startup to install the backends.

use crate::utils::config::LoggingSettings;
use crate::utils::errors::{Result, TelemetryError};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(settings: &LoggingSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_target(false);

    let installed = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| {
        TelemetryError::Observability(format!("failed to install tracing subscriber: {}", e))
    })
}

/// Install the Prometheus metrics recorder
///
/// No listener is started; render the returned handle to scrape.
pub fn init_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new().install_recorder().map_err(|e| {
        TelemetryError::Observability(format!("failed to install metrics recorder: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice_fails() {
        let settings = LoggingSettings {
            level: "debug".to_string(),
            json: false,
        };

        // another test may already have installed a subscriber
        let _ = init_tracing(&settings);
        assert!(matches!(
            init_tracing(&settings),
            Err(TelemetryError::Observability(_))
        ));
    }
}
