//! Bounded evicting queue.
//!
//! The two pipeline queues decouple device polling from broker delivery.
//! When a queue is full, inserting evicts the oldest entry instead of
//! blocking the producer or failing. Eviction is the designed backpressure
//! mechanism and is not reported as an error.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Fixed-capacity FIFO that drops the oldest element on overflow.
///
/// Internally synchronized; safe to share between one producer task and
/// one consumer task. Insertion order is preserved except for eviction of
/// the oldest entries when full. Never blocks, never fails.
#[derive(Debug)]
pub struct EvictingQueue<T> {
    inner: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> EvictingQueue<T> {
    /// Creates a queue holding at most `capacity` elements.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Appends an element, evicting the oldest one if the queue is full.
    pub fn push(&self, item: T) {
        let mut inner = self.lock();
        if inner.len() == self.capacity {
            inner.pop_front();
        }
        inner.push_back(item);
    }

    /// Removes and returns the oldest element.
    pub fn pop(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Returns the number of queued elements.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if the queue holds no elements.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns the fixed capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> EvictingQueue<T> {
    /// Returns a clone of the oldest element without removing it.
    ///
    /// The forwarder peeks before publishing and only pops after the
    /// publish succeeded, so an unpublished message stays at the head.
    pub fn peek(&self) -> Option<T> {
        self.lock().front().cloned()
    }
}
