// src/utils/config.rs
//! Configuration loading
//!
//! Sources, later ones winning:
//!
//! 1. built-in defaults
//! 2. an optional file (toml, json or yaml, by extension)
//! 3. environment variables prefixed `SENTRA_TELEMETRY_`, with `__`
//!    separating nested keys, e.g. `SENTRA_TELEMETRY_RECORDER__DEFAULT_MAX_EVENTS`

use crate::recording::event::EventType;
use crate::recording::recorder::RecorderConfig;
use crate::recording::store::DEFAULT_MAX_EVENTS;
use crate::runtime::telemetry_writer::WriterConfig;
use crate::utils::errors::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "SENTRA_TELEMETRY";

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    pub recorder: RecorderSettings,
    pub writer: WriterSettings,
    pub logging: LoggingSettings,
}

/// Recorder capacities
#[derive(Debug, Clone, Deserialize)]
pub struct RecorderSettings {
    /// Maximum events per type unless overridden
    pub default_max_events: usize,

    /// Overrides keyed by event type name (e.g. `stack_sample`)
    #[serde(default)]
    pub max_events: HashMap<String, usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WriterSettings {
    /// Start the writer at boot
    pub enabled: bool,

    /// Seconds between drains
    pub flush_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl TelemetryConfig {
    /// Load from defaults and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load from defaults, an optional file, then the environment
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("recorder.default_max_events", DEFAULT_MAX_EVENTS as i64)?
            .set_default("writer.enabled", true)?
            .set_default("writer.flush_interval_secs", 60)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Recorder configuration with event type names resolved
    ///
    /// Capacities are validated when the recorder is built.
    pub fn recorder_config(&self) -> Result<RecorderConfig> {
        let max_events = self
            .recorder
            .max_events
            .iter()
            .map(|(name, max)| -> Result<(EventType, usize)> { Ok((name.parse()?, *max)) })
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(RecorderConfig {
            default_max_events: self.recorder.default_max_events,
            max_events,
        })
    }

    pub fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            flush_interval: Duration::from_secs(self.writer.flush_interval_secs),
            ..Default::default()
        }
    }
}
