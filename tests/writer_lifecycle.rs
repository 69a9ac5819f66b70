// tests/writer_lifecycle.rs
use sentra_lab_telemetry::recording::{
    Event, EventType, Exporter, JsonLinesExporter, MemoryExporter, Recorder, RecorderConfig,
};
use sentra_lab_telemetry::runtime::{ServiceStatus, TelemetryWriter, WriterConfig};
use sentra_lab_telemetry::{EventStore, TelemetryError};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn setup(exporter: Arc<dyn Exporter>) -> (Arc<Recorder>, TelemetryWriter) {
    let recorder = Arc::new(Recorder::new(RecorderConfig::default()).unwrap());
    let writer = TelemetryWriter::new(
        Arc::clone(&recorder),
        exporter,
        WriterConfig {
            flush_interval: Duration::from_secs(3600),
            ..Default::default()
        },
    )
    .unwrap();
    (recorder, writer)
}

struct FailingExporter {
    calls: AtomicUsize,
}

impl Exporter for FailingExporter {
    fn export(&self, _batch: EventStore) -> sentra_lab_telemetry::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(TelemetryError::ExportFailed("collector unreachable".to_string()))
    }
}

#[test]
fn test_lifecycle_sequences() {
    let (_, writer) = setup(Arc::new(MemoryExporter::new()));
    assert_eq!(writer.status(), ServiceStatus::Stopped);

    writer.enable().unwrap();
    writer.enable().unwrap();
    assert_eq!(writer.status(), ServiceStatus::Running);

    writer.disable().unwrap();
    writer.disable().unwrap();
    assert_eq!(writer.status(), ServiceStatus::Stopped);

    writer.enable().unwrap();
    writer.disable().unwrap();
    writer.enable().unwrap();
    assert_eq!(writer.status(), ServiceStatus::Running);
}

#[test]
fn test_producers_and_writer_share_recorder() {
    let exporter = Arc::new(MemoryExporter::new());
    let (recorder, writer) = setup(exporter.clone());
    writer.enable().unwrap();

    recorder.push_events((0..3).map(|i| Event::at(EventType::Span, i, json!({}))).collect());
    writer.add_integration("requests", true);
    writer.flush();

    recorder.push_event(Event::at(EventType::Span, 3, json!({})));
    writer.disable().unwrap();

    let batches = exporter.take();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].get(EventType::Span).map(|q| q.len()), Some(3));
    assert!(batches[0].get(EventType::AppIntegrationsChanged).is_some());
    assert_eq!(batches[1].get(EventType::Span).map(|q| q.len()), Some(1));
    assert!(batches[1].get(EventType::AppClosing).is_some());
    assert!(batches[1].get(EventType::AppIntegrationsChanged).is_none());
}

#[test]
fn test_export_failure_does_not_stop_writer() {
    let exporter = Arc::new(FailingExporter {
        calls: AtomicUsize::new(0),
    });
    let (_, writer) = setup(exporter.clone());
    writer.enable().unwrap();

    writer.flush();
    writer.flush();

    assert_eq!(exporter.calls.load(Ordering::SeqCst), 2);
    assert_eq!(writer.status(), ServiceStatus::Running);
}

#[test]
fn test_json_lines_sink() {
    let exporter = Arc::new(JsonLinesExporter::new(Vec::new()));
    let (recorder, writer) = setup(exporter.clone());

    recorder.push_event(Event::at(EventType::LockRelease, 42, json!({"lock": "db"})));
    writer.flush();
    drop(writer);

    let exporter = Arc::try_unwrap(exporter).ok().unwrap();
    let output = String::from_utf8(exporter.into_inner()).unwrap();
    assert!(output.lines().any(|line| line.contains("\"lock_release\"") && line.contains("\"db\"")));
    assert!(output.lines().any(|line| line.contains("\"app_heartbeat\"")));
}

#[test]
fn test_fork_keeps_status_and_clears_queues() {
    let (_, writer) = setup(Arc::new(MemoryExporter::new()));
    writer.enable().unwrap();
    writer.add_integration("fooo", true);
    writer.add_event(Event::new(EventType::AppHeartbeat, json!({})));

    writer.simulate_fork();

    assert!(writer.is_forked());
    assert_eq!(writer.queued_events(), 0);
    assert_eq!(writer.queued_integrations(), 0);
    assert_eq!(writer.status(), ServiceStatus::Running);

    // idempotency still holds after the fork
    writer.enable().unwrap();
    assert_eq!(writer.status(), ServiceStatus::Running);
    writer.disable().unwrap();
    writer.disable().unwrap();
    assert_eq!(writer.status(), ServiceStatus::Stopped);
}

#[test]
fn test_stopped_writer_refuses_events_and_dedupes_integrations() {
    let recorder = Arc::new(
        Recorder::new(RecorderConfig {
            default_max_events: 8,
            ..Default::default()
        })
        .unwrap(),
    );
    let writer = TelemetryWriter::new(
        Arc::clone(&recorder),
        Arc::new(MemoryExporter::new()),
        WriterConfig {
            flush_interval: Duration::from_secs(3600),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(writer.status(), ServiceStatus::Stopped);

    for i in 0..200_000u64 {
        writer.add_event(Event::at(EventType::AppHeartbeat, i, json!({})));
        writer.add_integration("fooo", true);
    }

    assert_eq!(writer.queued_events(), 0);
    assert_eq!(writer.queued_integrations(), 1);
    assert_eq!(writer.dropped_events(), 200_000);
}
