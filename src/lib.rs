// src/lib.rs
//! Sentra Lab Telemetry Core
//!
//! In-process buffering of telemetry events (trace spans, profiler samples,
//! usage events) between the producers that emit them and the exporter that
//! ships them.
//!
//! # Architecture
//!
//! - **recording**: events, bounded per-type queues, the recorder and exporters
//! - **runtime**: service lifecycle, the telemetry writer and fork handling
//! - **observability**: tracing and metrics setup for binaries
//! - **utils**: configuration and errors
//!
//! # Example
//!
//! ```no_run
//! use sentra_lab_telemetry::{Event, EventType, Recorder, RecorderConfig};
//! use serde_json::json;
//!
//! let recorder = Recorder::new(RecorderConfig::default())?;
//! recorder.push_event(Event::new(EventType::StackSample, json!({ "frames": 12 })));
//!
//! let drained = recorder.reset();
//! assert_eq!(drained.event_count(), 1);
//! # Ok::<(), sentra_lab_telemetry::TelemetryError>(())
//! ```

// Public module exports
pub mod observability;
pub mod recording;
pub mod runtime;
pub mod utils;

// Re-export commonly used types
pub use recording::{Event, EventStore, EventType, Exporter, Recorder, RecorderConfig};
pub use runtime::{ServiceStatus, TelemetryWriter, WriterConfig};
pub use utils::config::TelemetryConfig;
pub use utils::errors::{Result, TelemetryError};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
