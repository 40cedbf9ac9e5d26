//! Bounded, thread-safe FIFO of compressed units

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::types::CompressedUnit;

/// Default queue capacity in units
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Errors returned by blocking queue operations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The queue was aborted while (or before) waiting
    #[error("packet queue aborted")]
    Aborted,
}

#[derive(Default)]
struct QueueState {
    units: VecDeque<CompressedUnit>,
    /// Cumulative payload bytes currently queued
    bytes: usize,
    /// Next sequence tag, owned by this queue
    next_sequence: u64,
    /// Producer finished without a sentinel (read failure)
    closed: bool,
    aborted: bool,
}

/// Bounded FIFO between a source's reader thread and its decode thread
///
/// `put` blocks while the queue is at capacity, `get` blocks while it is
/// empty. Both waits loop on their predicate and also wake on abort.
pub struct PacketQueue {
    state: Mutex<QueueState>,
    cond: Condvar,
    /// `None` means unbounded
    capacity: Option<usize>,
}

impl PacketQueue {
    /// Create a queue holding at most `capacity` units (at least one)
    pub fn new(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity.max(1)))
    }

    /// Create a queue without a capacity bound
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            cond: Condvar::new(),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_full(&self, state: &QueueState) -> bool {
        self.capacity
            .map(|cap| state.units.len() >= cap)
            .unwrap_or(false)
    }

    /// Enqueue a unit, blocking while the queue is full
    ///
    /// Stamps the unit with the queue's next sequence tag and returns it.
    pub fn put(&self, mut unit: CompressedUnit) -> Result<u64, QueueError> {
        let state = self.lock();
        let mut state = self
            .cond
            .wait_while(state, |s| !s.aborted && self.is_full(s))
            .unwrap_or_else(PoisonError::into_inner);

        if state.aborted {
            return Err(QueueError::Aborted);
        }

        state.next_sequence += 1;
        let sequence = state.next_sequence;
        unit.sequence = sequence;
        state.bytes += unit.size();
        state.units.push_back(unit);
        drop(state);

        self.cond.notify_all();
        Ok(sequence)
    }

    /// Enqueue the end-of-stream sentinel for a stream
    pub fn put_null_packet(&self, stream_id: u32) -> Result<u64, QueueError> {
        self.put(CompressedUnit::sentinel(stream_id))
    }

    /// Dequeue the oldest unit, blocking while the queue is empty
    ///
    /// Returns `None` once the queue is aborted, or once it is closed and
    /// fully drained.
    pub fn get(&self) -> Option<CompressedUnit> {
        let state = self.lock();
        let mut state = self
            .cond
            .wait_while(state, |s| !s.aborted && !s.closed && s.units.is_empty())
            .unwrap_or_else(PoisonError::into_inner);

        if state.aborted {
            return None;
        }

        let unit = state.units.pop_front()?;
        state.bytes -= unit.size();
        drop(state);

        self.cond.notify_all();
        Some(unit)
    }

    /// Discard all queued units and reset the byte counter
    pub fn flush(&self) {
        let mut state = self.lock();
        state.units.clear();
        state.bytes = 0;
        drop(state);
        self.cond.notify_all();
    }

    /// Mark the producer side finished without a sentinel
    ///
    /// Consumers drain what is queued, then `get` returns `None`.
    pub fn close(&self) {
        self.lock().closed = true;
        self.cond.notify_all();
    }

    /// Wake every waiter and make all further blocking calls return immediately
    pub fn abort(&self) {
        self.lock().aborted = true;
        self.cond.notify_all();
    }

    /// Whether `abort` has been called
    pub fn is_aborted(&self) -> bool {
        self.lock().aborted
    }

    /// Number of queued units
    pub fn len(&self) -> usize {
        self.lock().units.len()
    }

    /// Check if no units are queued
    pub fn is_empty(&self) -> bool {
        self.lock().units.is_empty()
    }

    /// Cumulative payload bytes currently queued
    pub fn byte_size(&self) -> usize {
        self.lock().bytes
    }

    /// Capacity in units, `None` when unbounded
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

impl Default for PacketQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
