//! Bounded input queues.
//!
//! Producers never block: when a queue is full the oldest item is discarded
//! to make room for the newest one.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default capacity of the video input queue.
pub const DEFAULT_VIDEO_CAPACITY: usize = 10;
/// Default capacity of the audio input queue.
pub const DEFAULT_AUDIO_CAPACITY: usize = 20;

/// FIFO queue with a drop-oldest overflow policy.
#[derive(Debug)]
pub struct DropOldestQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl<T> DropOldestQueue<T> {
    /// A queue holding at most `capacity` items (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Append `item`, returning the discarded oldest item if the queue was full.
    pub fn push(&self, item: T) -> Option<T> {
        let mut items = self.items.lock();
        let evicted = if items.len() >= self.capacity {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            items.pop_front()
        } else {
            None
        };
        items.push_back(item);
        evicted
    }

    pub fn pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Remove and return everything, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.items.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items discarded by overflow so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
