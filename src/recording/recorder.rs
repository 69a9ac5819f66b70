// src/recording/recorder.rs
//! Synchronized event recorder
//!
//! Producers push events from any thread; an exporter periodically calls
//! [`Recorder::reset`] to take the whole buffered [`EventStore`] and leave
//! a fresh one in its place.
//!
//! # Fork safety
//!
//! The recorder registers a fork hook at construction. In a forked child
//! the state of the inherited lock is unknown (another thread of the parent
//! may have held it), so the child never touches it again: pushes become
//! no-ops and `reset` returns an empty store. Losing the child's events is
//! preferred to deadlocking it.

use crate::recording::event::{Event, EventType};
use crate::recording::store::{CapacityPolicy, EventStore, DEFAULT_MAX_EVENTS};
use crate::runtime::forksafe::{self, ForkHook};
use crate::utils::errors::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Recorder configuration
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Maximum events kept per event type unless overridden
    pub default_max_events: usize,

    /// Per event type maximum
    pub max_events: HashMap<EventType, usize>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            default_max_events: DEFAULT_MAX_EVENTS,
            max_events: HashMap::new(),
        }
    }
}

/// Recorder statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecorderStats {
    /// Events accepted into a queue
    pub events_pushed: u64,

    /// Events evicted by capacity pressure
    pub events_evicted: u64,

    /// Events dropped because the process forked
    pub events_dropped: u64,

    /// Number of `reset` calls that swapped the store
    pub resets: u64,
}

#[derive(Debug, Default)]
struct ForkGuard {
    forked: AtomicBool,
}

impl ForkHook for ForkGuard {
    fn after_fork_child(&self) {
        self.forked.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct Counters {
    pushed: AtomicU64,
    evicted: AtomicU64,
    dropped: AtomicU64,
    resets: AtomicU64,
}

/// Buffers events per type until drained
#[derive(Debug)]
pub struct Recorder {
    policy: Arc<CapacityPolicy>,
    events: Mutex<EventStore>,
    fork_guard: Arc<ForkGuard>,
    counters: Counters,
}

impl Recorder {
    /// Create a recorder and register its fork hook
    ///
    /// Fails if any configured capacity is zero.
    pub fn new(config: RecorderConfig) -> Result<Self> {
        let policy = Arc::new(CapacityPolicy::new(
            config.default_max_events,
            &config.max_events,
        )?);

        let fork_guard = Arc::new(ForkGuard::default());
        forksafe::register(&fork_guard)?;

        info!(
            "Initialized event recorder (default max events {}, {} overrides)",
            policy.default_max_events(),
            config.max_events.len()
        );

        Ok(Self {
            events: Mutex::new(EventStore::new(Arc::clone(&policy))),
            policy,
            fork_guard,
            counters: Counters::default(),
        })
    }

    /// Push a single event
    pub fn push_event(&self, event: Event) {
        self.push_events(vec![event]);
    }

    /// Push a batch of events
    ///
    /// All events in the batch MUST have the same type. This is not checked:
    /// the whole batch goes to the queue of the first event's type.
    pub fn push_events(&self, events: Vec<Event>) {
        let Some(first) = events.first() else {
            return;
        };
        let event_type = first.event_type();
        let count = events.len() as u64;

        if self.is_forked() {
            self.counters.dropped.fetch_add(count, Ordering::Relaxed);
            metrics::counter!("telemetry_recorder_events_dropped_total", "event_type" => event_type.as_str())
                .increment(count);
            return;
        }

        let evicted = self.events.lock().queue_for(event_type).append_many(events) as u64;

        self.counters.pushed.fetch_add(count, Ordering::Relaxed);
        metrics::counter!("telemetry_recorder_events_pushed_total", "event_type" => event_type.as_str())
            .increment(count);
        if evicted > 0 {
            self.counters.evicted.fetch_add(evicted, Ordering::Relaxed);
            metrics::counter!("telemetry_recorder_events_evicted_total", "event_type" => event_type.as_str())
                .increment(evicted);
        }
    }

    /// Take every buffered event, leaving an empty store behind
    ///
    /// The returned store belongs to the caller alone; no other `reset`
    /// will ever return the same events.
    pub fn reset(&self) -> EventStore {
        let fresh = EventStore::new(Arc::clone(&self.policy));

        if self.is_forked() {
            return fresh;
        }

        let drained = std::mem::replace(&mut *self.events.lock(), fresh);

        self.counters.resets.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("telemetry_recorder_resets_total").increment(1);
        drained
    }

    /// Whether this process is a fork child of the one that built the recorder
    pub fn is_forked(&self) -> bool {
        self.fork_guard.forked.load(Ordering::SeqCst)
    }

    /// Run the recorder's fork hook as a forked child would
    ///
    /// Irreversible. Meant for tests and for hosts without `fork()`.
    pub fn simulate_fork(&self) {
        forksafe::simulate_fork(self.fork_guard.as_ref());
    }

    pub fn policy(&self) -> &Arc<CapacityPolicy> {
        &self.policy
    }

    /// Get recorder statistics
    pub fn stats(&self) -> RecorderStats {
        RecorderStats {
            events_pushed: self.counters.pushed.load(Ordering::Relaxed),
            events_evicted: self.counters.evicted.load(Ordering::Relaxed),
            events_dropped: self.counters.dropped.load(Ordering::Relaxed),
            resets: self.counters.resets.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::errors::TelemetryError;
    use serde_json::json;

    fn event(event_type: EventType, seq: u64) -> Event {
        Event::at(event_type, seq, json!({ "seq": seq }))
    }

    fn recorder(default_max_events: usize) -> Recorder {
        Recorder::new(RecorderConfig {
            default_max_events,
            ..Default::default()
        })
        .unwrap()
    }

    fn drained_seqs(store: &EventStore, event_type: EventType) -> Vec<u64> {
        store
            .get(event_type)
            .map(|q| q.iter().map(Event::timestamp_ns).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_recorder_creation() {
        let recorder = Recorder::new(RecorderConfig::default()).unwrap();
        assert_eq!(recorder.policy().default_max_events().get(), 16_384);
        assert!(!recorder.is_forked());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = Recorder::new(RecorderConfig {
            default_max_events: 0,
            ..Default::default()
        });
        assert!(matches!(result, Err(TelemetryError::InvalidCapacity { .. })));
    }

    #[test]
    fn test_push_and_reset() {
        let recorder = recorder(16_384);
        recorder.push_events((0..5).map(|i| event(EventType::Span, i)).collect());
        recorder.push_event(event(EventType::LockAcquire, 10));

        let store = recorder.reset();
        assert_eq!(drained_seqs(&store, EventType::Span), vec![0, 1, 2, 3, 4]);
        assert_eq!(drained_seqs(&store, EventType::LockAcquire), vec![10]);

        assert!(recorder.reset().is_empty());
    }

    #[test]
    fn test_push_empty_batch_is_noop() {
        let recorder = recorder(4);
        recorder.push_events(Vec::new());
        assert!(recorder.reset().is_empty());
        assert_eq!(recorder.stats().events_pushed, 0);
    }

    #[test]
    fn test_capacity_eviction() {
        let recorder = recorder(3);
        for seq in 0..4 {
            recorder.push_event(event(EventType::StackSample, seq));
        }

        let store = recorder.reset();
        assert_eq!(drained_seqs(&store, EventType::StackSample), vec![1, 2, 3]);
        assert_eq!(recorder.stats().events_evicted, 1);
    }

    #[test]
    fn test_per_type_override() {
        let recorder = Recorder::new(RecorderConfig {
            default_max_events: 10,
            max_events: HashMap::from([(EventType::MemoryAllocSample, 2)]),
        })
        .unwrap();

        recorder.push_events((0..5).map(|i| event(EventType::MemoryAllocSample, i)).collect());
        recorder.push_events((0..5).map(|i| event(EventType::StackSample, i)).collect());

        let store = recorder.reset();
        assert_eq!(drained_seqs(&store, EventType::MemoryAllocSample), vec![3, 4]);
        assert_eq!(store.get(EventType::StackSample).map(|q| q.len()), Some(5));
    }

    #[test]
    fn test_simulated_fork_drops_pushes() {
        let recorder = recorder(8);
        recorder.simulate_fork();

        recorder.push_event(event(EventType::Span, 1));
        recorder.push_events(vec![event(EventType::Span, 2), event(EventType::Span, 3)]);

        assert!(recorder.is_forked());
        assert!(recorder.reset().is_empty());

        let stats = recorder.stats();
        assert_eq!(stats.events_pushed, 0);
        assert_eq!(stats.events_dropped, 3);
        assert_eq!(stats.resets, 0);
    }

    #[test]
    fn test_fork_discards_inherited_events() {
        let recorder = recorder(8);
        recorder.push_event(event(EventType::Span, 1));
        recorder.simulate_fork();

        assert!(recorder.reset().is_empty());
    }

    #[test]
    fn test_stats() {
        let recorder = recorder(8);
        recorder.push_events((0..3).map(|i| event(EventType::Span, i)).collect());
        recorder.reset();

        let stats = recorder.stats();
        assert_eq!(stats.events_pushed, 3);
        assert_eq!(stats.resets, 1);
    }
}
