// src/utils/errors.rs
//! Error types for the telemetry core
//!
//! Only construction and wiring can fail. Pushing and draining events has no
//! error path: capacity pressure is handled by eviction.

use thiserror::Error;

/// Errors produced by the telemetry core
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A queue capacity of zero was configured
    #[error("invalid capacity for {scope}: capacity must be at least 1")]
    InvalidCapacity { scope: String },
    
    /// A configured event type name is not known
    #[error("unknown event type: {0}")]
    UnknownEventType(String),
    
    /// `pthread_atfork` refused to install the fork handlers
    #[error("failed to install fork handlers (errno {0})")]
    ForkHandlerInstall(i32),
    
    /// The periodic worker thread could not be started
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),
    
    /// An exporter rejected a drained batch
    #[error("export failed: {0}")]
    ExportFailed(String),
    
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    
    /// Logging or metrics could not be installed
    #[error("observability setup failed: {0}")]
    Observability(String),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, TelemetryError>;
