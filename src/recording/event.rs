// src/recording/event.rs
//! Telemetry events and their type discriminator

use crate::utils::errors::TelemetryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Event types
///
/// The type decides which queue an event lands in when recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Span,
    StackSample,
    StackExceptionSample,
    LockAcquire,
    LockRelease,
    MemoryAllocSample,
    MemoryHeapSample,
    AppStarted,
    AppIntegrationsChanged,
    AppHeartbeat,
    AppClosing,
}

impl EventType {
    /// Every known event type
    pub const ALL: [EventType; 11] = [
        EventType::Span,
        EventType::StackSample,
        EventType::StackExceptionSample,
        EventType::LockAcquire,
        EventType::LockRelease,
        EventType::MemoryAllocSample,
        EventType::MemoryHeapSample,
        EventType::AppStarted,
        EventType::AppIntegrationsChanged,
        EventType::AppHeartbeat,
        EventType::AppClosing,
    ];

    /// Get the snake_case name of this event type
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Span => "span",
            EventType::StackSample => "stack_sample",
            EventType::StackExceptionSample => "stack_exception_sample",
            EventType::LockAcquire => "lock_acquire",
            EventType::LockRelease => "lock_release",
            EventType::MemoryAllocSample => "memory_alloc_sample",
            EventType::MemoryHeapSample => "memory_heap_sample",
            EventType::AppStarted => "app_started",
            EventType::AppIntegrationsChanged => "app_integrations_changed",
            EventType::AppHeartbeat => "app_heartbeat",
            EventType::AppClosing => "app_closing",
        }
    }

    /// Whether this is a usage event produced by the telemetry writer
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            EventType::AppStarted
                | EventType::AppIntegrationsChanged
                | EventType::AppHeartbeat
                | EventType::AppClosing
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TelemetryError::UnknownEventType(s.to_string()))
    }
}

/// A recorded telemetry event
///
/// Events are immutable once built. The payload is opaque to the recorder;
/// only the exporter interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    event_type: EventType,
    timestamp_ns: u64,
    data: serde_json::Value,
}

impl Event {
    /// Create an event stamped with the current wall-clock time
    pub fn new(event_type: EventType, data: serde_json::Value) -> Self {
        let timestamp_ns = chrono::Utc::now()
            .timestamp_nanos_opt()
            .map(|ns| ns.max(0) as u64)
            .unwrap_or_default();
        Self::at(event_type, timestamp_ns, data)
    }

    /// Create an event with an explicit timestamp (nanoseconds since epoch)
    pub fn at(event_type: EventType, timestamp_ns: u64, data: serde_json::Value) -> Self {
        Self {
            event_type,
            timestamp_ns,
            data,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn timestamp_ns(&self) -> u64 {
        self.timestamp_ns
    }

    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }
}
