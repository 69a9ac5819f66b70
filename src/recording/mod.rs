// src/recording/mod.rs
//! Event recording
//!
//! - **Event**: typed, immutable telemetry record
//! - **BoundedEventQueue**: drop-oldest queue for one event type
//! - **EventStore**: lazily created queue per event type
//! - **Recorder**: locked facade with push/reset and the fork switch
//! - **Exporter**: consumers of drained stores
//!
//! # Architecture
//!
//! ```text
//! producers → push_events() → [lock] EventStore[type].append_many()
//!                                        │
//! writer    → reset() ──────────────────►│ swap in empty store
//!                │
//!                ▼
//!         Exporter::export(old store)
//! ```

pub mod event;
pub mod event_queue;
pub mod exporter;
pub mod recorder;
pub mod store;

// Re-export commonly used types
pub use event::{Event, EventType};
pub use event_queue::BoundedEventQueue;
pub use exporter::{Exporter, JsonLinesExporter, LogExporter, MemoryExporter};
pub use recorder::{Recorder, RecorderConfig, RecorderStats};
pub use store::{CapacityPolicy, EventStore, DEFAULT_MAX_EVENTS};
