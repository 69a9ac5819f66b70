// src/recording/store.rs
//! Per-type event store
//!
//! Maps each event type to its own bounded queue. Queues are created the
//! first time a type is written, with a capacity resolved by the
//! [`CapacityPolicy`]. The store does no locking of its own; the
//! [`Recorder`](crate::recording::recorder::Recorder) serializes access.

use crate::recording::event::EventType;
use crate::recording::event_queue::BoundedEventQueue;
use crate::utils::errors::{Result, TelemetryError};
use std::collections::hash_map::{self, HashMap};
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Default maximum number of events kept per event type
pub const DEFAULT_MAX_EVENTS: usize = 16_384;

/// Validated queue capacities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityPolicy {
    default_max_events: NonZeroUsize,
    max_events: HashMap<EventType, NonZeroUsize>,
}

impl CapacityPolicy {
    /// Build a policy, rejecting any zero capacity
    pub fn new(default_max_events: usize, max_events: &HashMap<EventType, usize>) -> Result<Self> {
        let default_max_events =
            NonZeroUsize::new(default_max_events).ok_or_else(|| TelemetryError::InvalidCapacity {
                scope: "default".to_string(),
            })?;

        let max_events = max_events
            .iter()
            .map(|(event_type, max)| {
                NonZeroUsize::new(*max)
                    .map(|max| (*event_type, max))
                    .ok_or_else(|| TelemetryError::InvalidCapacity {
                        scope: event_type.to_string(),
                    })
            })
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(Self {
            default_max_events,
            max_events,
        })
    }

    /// Capacity of the queue for `event_type`
    pub fn capacity_for(&self, event_type: EventType) -> NonZeroUsize {
        self.max_events
            .get(&event_type)
            .copied()
            .unwrap_or(self.default_max_events)
    }

    pub fn default_max_events(&self) -> NonZeroUsize {
        self.default_max_events
    }
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        Self {
            default_max_events: NonZeroUsize::new(DEFAULT_MAX_EVENTS)
                .unwrap_or(NonZeroUsize::MIN),
            max_events: HashMap::new(),
        }
    }
}

/// Mapping of event type to its queue
#[derive(Debug)]
pub struct EventStore {
    policy: Arc<CapacityPolicy>,
    queues: HashMap<EventType, BoundedEventQueue>,
}

impl EventStore {
    /// Create an empty store
    pub fn new(policy: Arc<CapacityPolicy>) -> Self {
        Self {
            policy,
            queues: HashMap::new(),
        }
    }

    /// Get the queue for `event_type`, creating it on first use
    pub fn queue_for(&mut self, event_type: EventType) -> &mut BoundedEventQueue {
        let policy = &self.policy;
        self.queues
            .entry(event_type)
            .or_insert_with(|| BoundedEventQueue::new(policy.capacity_for(event_type)))
    }

    /// Get the queue for `event_type` if anything was recorded for it
    pub fn get(&self, event_type: EventType) -> Option<&BoundedEventQueue> {
        self.queues.get(&event_type)
    }

    /// True when no event type has been written
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Number of event types present
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    /// Total events buffered across all types
    pub fn event_count(&self) -> usize {
        self.queues.values().map(BoundedEventQueue::len).sum()
    }

    /// Total events evicted across all types
    pub fn evicted_count(&self) -> u64 {
        self.queues.values().map(BoundedEventQueue::evicted).sum()
    }

    /// Event types present, sorted
    pub fn event_types(&self) -> Vec<EventType> {
        let mut types: Vec<EventType> = self.queues.keys().copied().collect();
        types.sort();
        types
    }

    pub fn iter(&self) -> hash_map::Iter<'_, EventType, BoundedEventQueue> {
        self.queues.iter()
    }

    pub fn policy(&self) -> &Arc<CapacityPolicy> {
        &self.policy
    }
}

impl IntoIterator for EventStore {
    type Item = (EventType, BoundedEventQueue);
    type IntoIter = hash_map::IntoIter<EventType, BoundedEventQueue>;

    fn into_iter(self) -> Self::IntoIter {
        self.queues.into_iter()
    }
}
