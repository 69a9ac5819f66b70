// src/runtime/telemetry_writer.rs
//! Telemetry writer service
//!
//! The writer owns the periodic drain loop. While RUNNING, a background
//! worker wakes every `flush_interval` and:
//!
//! 1. takes the queued usage events and integrations
//! 2. turns integrations into one `app_integrations_changed` event and adds
//!    an `app_heartbeat`
//! 3. pushes those into the [`Recorder`] like any other producer
//! 4. drains the recorder with `reset()` and hands the batch to the exporter
//!
//! Both queues are bounded by the recorder's [`CapacityPolicy`]. Usage
//! events keep the newest per type; integrations are keyed by name, so
//! re-adding one updates it in place. Usage events are only accepted while
//! RUNNING and are dropped (and counted) otherwise.
//!
//! # Fork safety
//!
//! The writer lock is held across `fork()`. In the child it is released,
//! both queues are cleared, the worker handle is abandoned (its thread only
//! exists in the parent) and `forked` is set. The status is left as is.

use crate::recording::event::{Event, EventType};
use crate::recording::exporter::Exporter;
use crate::recording::recorder::Recorder;
use crate::recording::store::{CapacityPolicy, EventStore};
use crate::runtime::forksafe::{self, ForkHook};
use crate::runtime::service::{PeriodicWorker, ServiceLifecycle, ServiceStatus};
use crate::utils::errors::Result;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Writer configuration
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Interval between drains
    pub flush_interval: Duration,

    /// Name of the worker thread
    pub thread_name: String,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(60),
            thread_name: "telemetry-writer".to_string(),
        }
    }
}

/// Integration usage record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Integration {
    pub name: String,
    pub enabled: bool,
}

#[derive(Debug)]
struct WriterState {
    lifecycle: ServiceLifecycle,
    events_queue: EventStore,
    integrations_queue: VecDeque<Integration>,
    worker: Option<PeriodicWorker>,
}

impl WriterState {
    fn new(policy: Arc<CapacityPolicy>) -> Self {
        Self {
            lifecycle: ServiceLifecycle::default(),
            events_queue: EventStore::new(policy),
            integrations_queue: VecDeque::new(),
            worker: None,
        }
    }

    fn queue_event(&mut self, event: Event) {
        self.events_queue
            .queue_for(event.event_type())
            .append(event);
    }

    /// Insert or update by name, evicting the oldest name when full
    fn queue_integration(&mut self, integration: Integration) {
        if let Some(existing) = self
            .integrations_queue
            .iter_mut()
            .find(|i| i.name == integration.name)
        {
            existing.enabled = integration.enabled;
            return;
        }

        let cap = self
            .events_queue
            .policy()
            .capacity_for(EventType::AppIntegrationsChanged)
            .get();
        if self.integrations_queue.len() == cap {
            self.integrations_queue.pop_front();
        }
        self.integrations_queue.push_back(integration);
    }

    fn take_queues(&mut self) -> (EventStore, VecDeque<Integration>) {
        let fresh = EventStore::new(Arc::clone(self.events_queue.policy()));
        (
            std::mem::replace(&mut self.events_queue, fresh),
            std::mem::take(&mut self.integrations_queue),
        )
    }
}

struct WriterInner {
    config: WriterConfig,
    recorder: Arc<Recorder>,
    exporter: Arc<dyn Exporter>,
    state: Mutex<WriterState>,
    forked: AtomicBool,
    dropped_events: AtomicU64,
}

impl WriterInner {
    fn flush(&self) {
        let (events, integrations) = self.state.lock().take_queues();

        if events.evicted_count() > 0 {
            debug!("{} queued usage events evicted before flush", events.evicted_count());
        }
        for (_, queue) in events {
            self.recorder.push_events(queue.into_events());
        }

        if !integrations.is_empty() {
            self.recorder.push_event(Event::new(
                EventType::AppIntegrationsChanged,
                json!({ "integrations": integrations }),
            ));
        }
        self.recorder
            .push_event(Event::new(EventType::AppHeartbeat, json!({})));

        let batch = self.recorder.reset();
        if batch.is_empty() {
            debug!("Nothing to export");
            return;
        }

        let count = batch.event_count();
        match self.exporter.export(batch) {
            Ok(()) => debug!("Exported {} events", count),
            Err(e) => warn!("Failed to export {} events: {}", count, e),
        }
    }

    fn drop_event(&self, event_type: EventType) {
        self.dropped_events.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("telemetry_writer_events_dropped_total", "event_type" => event_type.as_str())
            .increment(1);
        debug!("Dropped {} event: telemetry writer is stopped", event_type);
    }
}

impl ForkHook for WriterInner {
    fn before_fork(&self) {
        forksafe::lock_for_fork(&self.state);
    }

    fn after_fork_parent(&self) {
        // SAFETY: locked by `before_fork` on this thread.
        unsafe { self.state.force_unlock() };
    }

    fn after_fork_child(&self) {
        // SAFETY: locked by `before_fork` in the parent; the forking thread
        // is the only thread of the child. A parent thread parked on this
        // lock makes the unlock take parking_lot's unpark path, which is the
        // residual risk described in `runtime::forksafe`.
        unsafe { self.state.force_unlock() };

        let mut state = self.state.lock();
        drop(state.take_queues());
        if let Some(worker) = state.worker.take() {
            worker.abandon();
        }
        self.forked.store(true, Ordering::SeqCst);
    }
}

/// Periodically drains a recorder into an exporter
pub struct TelemetryWriter {
    inner: Arc<WriterInner>,
}

impl TelemetryWriter {
    /// Create a stopped writer and register its fork hook
    ///
    /// The writer's queues share the recorder's capacity policy.
    pub fn new(
        recorder: Arc<Recorder>,
        exporter: Arc<dyn Exporter>,
        config: WriterConfig,
    ) -> Result<Self> {
        let state = WriterState::new(Arc::clone(recorder.policy()));
        let inner = Arc::new(WriterInner {
            config,
            recorder,
            exporter,
            state: Mutex::new(state),
            forked: AtomicBool::new(false),
            dropped_events: AtomicU64::new(0),
        });
        forksafe::register(&inner)?;

        Ok(Self { inner })
    }

    /// Start the writer
    ///
    /// Queues an `app_started` event and starts the periodic worker. Does
    /// nothing if already running.
    pub fn enable(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.lifecycle.status() == ServiceStatus::Running {
            debug!("Telemetry writer already running");
            return Ok(());
        }

        let weak: Weak<WriterInner> = Arc::downgrade(&self.inner);
        let worker = PeriodicWorker::spawn(
            &self.inner.config.thread_name,
            self.inner.config.flush_interval,
            move || {
                if let Some(inner) = weak.upgrade() {
                    inner.flush();
                }
            },
        )?;

        state.lifecycle.transition(ServiceStatus::Running);
        state.queue_event(Event::new(EventType::AppStarted, json!({})));
        state.worker = Some(worker);

        info!(
            "Telemetry writer enabled (flush interval {:?})",
            self.inner.config.flush_interval
        );
        Ok(())
    }

    /// Stop the writer
    ///
    /// Stops the worker, queues an `app_closing` event and flushes once more.
    /// Does nothing if already stopped.
    pub fn disable(&self) -> Result<()> {
        let worker = {
            let mut state = self.inner.state.lock();
            if !state.lifecycle.transition(ServiceStatus::Stopped) {
                debug!("Telemetry writer already stopped");
                return Ok(());
            }
            state.queue_event(Event::new(EventType::AppClosing, json!({})));
            state.worker.take()
        };

        // the worker takes the state lock while flushing
        if let Some(worker) = worker {
            worker.stop();
        }
        self.inner.flush();

        info!("Telemetry writer disabled");
        Ok(())
    }

    pub fn status(&self) -> ServiceStatus {
        self.inner.state.lock().lifecycle.status()
    }

    /// Record an integration as used
    ///
    /// Accepted in any state, so integrations set up before `enable` are
    /// reported by the first flush. Re-adding a name replaces its entry.
    pub fn add_integration(&self, name: impl Into<String>, enabled: bool) {
        let integration = Integration {
            name: name.into(),
            enabled,
        };
        debug!("Queued integration {:?}", integration);
        self.inner.state.lock().queue_integration(integration);
    }

    /// Queue an event for the next flush
    ///
    /// Usage events wait in the writer's queue; any other type goes straight
    /// to the recorder. Dropped while the writer is stopped.
    pub fn add_event(&self, event: Event) {
        let event_type = event.event_type();
        {
            let mut state = self.inner.state.lock();
            if state.lifecycle.status() != ServiceStatus::Running {
                drop(state);
                self.inner.drop_event(event_type);
                return;
            }
            if event_type.is_usage() {
                state.queue_event(event);
                return;
            }
        }
        self.inner.recorder.push_event(event);
    }

    /// Run one drain cycle now
    pub fn flush(&self) {
        self.inner.flush();
    }

    /// Usage events waiting for the next flush, across all types
    pub fn queued_events(&self) -> usize {
        self.inner.state.lock().events_queue.event_count()
    }

    pub fn queued_integrations(&self) -> usize {
        self.inner.state.lock().integrations_queue.len()
    }

    /// Events refused because the writer was stopped
    pub fn dropped_events(&self) -> u64 {
        self.inner.dropped_events.load(Ordering::Relaxed)
    }

    /// Whether this process is a fork child of the one that built the writer
    pub fn is_forked(&self) -> bool {
        self.inner.forked.load(Ordering::SeqCst)
    }

    /// Run the writer's fork hook as a forked child would
    pub fn simulate_fork(&self) {
        forksafe::simulate_fork(self.inner.as_ref());
    }

    pub fn recorder(&self) -> &Arc<Recorder> {
        &self.inner.recorder
    }
}

impl Drop for TelemetryWriter {
    fn drop(&mut self) {
        if self.status() == ServiceStatus::Running {
            if let Err(e) = self.disable() {
                warn!("Failed to disable telemetry writer on drop: {}", e);
            }
        }
    }
}
