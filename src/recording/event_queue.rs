// src/recording/event_queue.rs
//! Bounded drop-oldest event queue
//!
//! Holds the events of a single type. When the queue is full, appending
//! evicts from the head so the queue always keeps the most recent events.

use crate::recording::event::Event;
use std::collections::{vec_deque, VecDeque};
use std::num::NonZeroUsize;

/// Fixed-capacity queue of events of one type
#[derive(Debug, Clone)]
pub struct BoundedEventQueue {
    /// Buffered events, oldest first
    events: VecDeque<Event>,

    /// Maximum number of buffered events
    capacity: NonZeroUsize,

    /// Events evicted since creation
    evicted: u64,
}

impl BoundedEventQueue {
    /// Create an empty queue
    ///
    /// Storage grows on demand up to `capacity`; nothing is preallocated.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity,
            evicted: 0,
        }
    }

    /// Append one event, evicting the oldest one if the queue is full
    pub fn append(&mut self, event: Event) -> usize {
        let mut evicted = 0;
        if self.is_full() {
            self.events.pop_front();
            evicted = 1;
        }
        self.events.push_back(event);
        self.evicted += evicted as u64;
        evicted
    }

    /// Append a batch of events, returning how many were evicted
    ///
    /// The batch is assumed to hold events of this queue's type only. This
    /// is not checked.
    pub fn append_many(&mut self, events: Vec<Event>) -> usize {
        let cap = self.capacity.get();
        let incoming = events.len();

        let evicted = if incoming >= cap {
            // Only the tail of the batch survives.
            let evicted = self.events.len() + (incoming - cap);
            self.events.clear();
            self.events.extend(events.into_iter().skip(incoming - cap));
            evicted
        } else {
            let overflow = (self.events.len() + incoming).saturating_sub(cap);
            self.events.drain(..overflow);
            self.events.extend(events);
            overflow
        };

        self.evicted += evicted as u64;
        evicted
    }

    /// Consume the queue and return its events in insertion order
    pub fn into_events(self) -> Vec<Event> {
        self.events.into()
    }

    /// Iterate over the buffered events, oldest first
    pub fn iter(&self) -> vec_deque::Iter<'_, Event> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.events.len() == self.capacity.get()
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    /// Total events evicted from this queue
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

impl IntoIterator for BoundedEventQueue {
    type Item = Event;
    type IntoIter = vec_deque::IntoIter<Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a> IntoIterator for &'a BoundedEventQueue {
    type Item = &'a Event;
    type IntoIter = vec_deque::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
