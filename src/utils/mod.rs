// src/utils/mod.rs
//! Common utilities: error types and configuration loading

pub mod config;
pub mod errors;

pub use config::{LoggingSettings, RecorderSettings, TelemetryConfig, WriterSettings};
pub use errors::{Result, TelemetryError};
