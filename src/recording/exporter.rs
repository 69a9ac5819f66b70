// src/recording/exporter.rs
//! Consumers of drained event stores
//!
//! An [`Exporter`] receives each [`EventStore`] drained by the telemetry
//! writer and owns it from then on. Transport to a remote collector is
//! outside this crate; the sinks here cover logging, local files and tests:
//!
//! - **LogExporter**: per-type counts through `tracing`
//! - **JsonLinesExporter**: one JSON object per event to any writer
//! - **MemoryExporter**: keeps batches in memory

use crate::recording::event::{Event, EventType};
use crate::recording::store::EventStore;
use crate::utils::errors::{Result, TelemetryError};
use parking_lot::Mutex;
use serde::Serialize;
use std::io::Write;
use tracing::{debug, info};

/// Receives drained event stores
pub trait Exporter: Send + Sync {
    /// Export one drained batch
    fn export(&self, batch: EventStore) -> Result<()>;
}

/// Logs a summary of each batch
#[derive(Debug, Default, Clone, Copy)]
pub struct LogExporter;

impl Exporter for LogExporter {
    fn export(&self, batch: EventStore) -> Result<()> {
        info!(
            "Exporting {} events across {} event types ({} evicted before drain)",
            batch.event_count(),
            batch.len(),
            batch.evicted_count()
        );
        for event_type in batch.event_types() {
            if let Some(queue) = batch.get(event_type) {
                debug!(
                    "  {}: {} events ({} evicted)",
                    event_type,
                    queue.len(),
                    queue.evicted()
                );
            }
        }
        Ok(())
    }
}

/// Line written for each exported event
#[derive(Serialize)]
struct ExportedEvent<'a> {
    event_type: EventType,
    timestamp: String,
    timestamp_ns: u64,
    data: &'a serde_json::Value,
}

impl<'a> ExportedEvent<'a> {
    fn new(event: &'a Event) -> Self {
        Self {
            event_type: event.event_type(),
            timestamp: format_timestamp(event.timestamp_ns()),
            timestamp_ns: event.timestamp_ns(),
            data: event.data(),
        }
    }
}

/// Writes every event as a JSON line
///
/// Types are written in a stable order; within a type, in insertion order.
pub struct JsonLinesExporter<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesExporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> Exporter for JsonLinesExporter<W> {
    fn export(&self, batch: EventStore) -> Result<()> {
        let mut out = self.out.lock();
        for event_type in batch.event_types() {
            let Some(queue) = batch.get(event_type) else {
                continue;
            };
            for event in queue {
                serde_json::to_writer(&mut *out, &ExportedEvent::new(event))?;
                out.write_all(b"\n")?;
            }
        }
        out.flush()
            .map_err(|e| TelemetryError::ExportFailed(format!("flush failed: {}", e)))
    }
}

/// Keeps exported batches in memory
#[derive(Debug, Default)]
pub struct MemoryExporter {
    batches: Mutex<Vec<EventStore>>,
}

impl MemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all batches exported so far
    pub fn take(&self) -> Vec<EventStore> {
        std::mem::take(&mut *self.batches.lock())
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }
}

impl Exporter for MemoryExporter {
    fn export(&self, batch: EventStore) -> Result<()> {
        self.batches.lock().push(batch);
        Ok(())
    }
}

fn format_timestamp(timestamp_ns: u64) -> String {
    use chrono::{DateTime, Utc};
    let secs = (timestamp_ns / 1_000_000_000) as i64;
    let nsecs = (timestamp_ns % 1_000_000_000) as u32;
    let dt = DateTime::<Utc>::from_timestamp(secs, nsecs).unwrap_or_default();
    dt.to_rfc3339()
}
