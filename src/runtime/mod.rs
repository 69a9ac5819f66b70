// src/runtime/mod.rs
//! Background services and process plumbing
//!
//! - **Service**: RUNNING/STOPPED lifecycle and the periodic worker thread
//! - **Telemetry Writer**: periodic drain of the recorder into an exporter
//! - **Forksafe**: `pthread_atfork` registration for fork hooks

pub mod forksafe;
pub mod service;
pub mod telemetry_writer;

// Re-export commonly used types
pub use forksafe::ForkHook;
pub use service::{PeriodicWorker, ServiceLifecycle, ServiceStatus};
pub use telemetry_writer::{Integration, TelemetryWriter, WriterConfig};
