// src/main.rs
//! Sentra Lab Telemetry
//!
//! Runs the recorder and telemetry writer inside a process, feeding them
//! synthetic profiler samples until interrupted.

use anyhow::{Context, Result};
use sentra_lab_telemetry::observability::{init_metrics, init_tracing};
use sentra_lab_telemetry::recording::{Event, EventType, LogExporter, Recorder};
use sentra_lab_telemetry::runtime::TelemetryWriter;
use sentra_lab_telemetry::TelemetryConfig;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Optional config file as the only argument
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = TelemetryConfig::load_from(config_path.as_deref())
        .context("failed to load configuration")?;

    init_tracing(&config.logging)?;
    let metrics = init_metrics()?;

    info!("Starting Sentra Lab Telemetry v{}", sentra_lab_telemetry::VERSION);
    info!("Configuration loaded: {:?}", config);

    let recorder = Arc::new(Recorder::new(config.recorder_config()?)?);
    let writer = TelemetryWriter::new(
        Arc::clone(&recorder),
        Arc::new(LogExporter),
        config.writer_config(),
    )?;

    if config.writer.enabled {
        writer.enable()?;
    }
    writer.add_integration("sentra-telemetry", true);

    // Synthetic producer
    let producer = tokio::spawn({
        let recorder = Arc::clone(&recorder);
        async move {
            let mut interval = tokio::time::interval(Duration::from_millis(10));
            let mut seq: u64 = 0;
            loop {
                interval.tick().await;
                let samples = (0..4)
                    .map(|thread| {
                        Event::new(
                            EventType::StackSample,
                            json!({ "thread_id": thread, "seq": seq }),
                        )
                    })
                    .collect();
                recorder.push_events(samples);
                seq += 1;
            }
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to install CTRL+C signal handler")?;
    info!("Received shutdown signal, cleaning up...");

    producer.abort();
    writer.disable()?;

    let stats = recorder.stats();
    info!(
        "Recorder stats: {} pushed, {} evicted, {} dropped, {} resets",
        stats.events_pushed, stats.events_evicted, stats.events_dropped, stats.resets
    );
    debug!("Metrics:\n{}", metrics.render());

    Ok(())
}
