//! Blocking byte ring buffer for decoded PCM
//!
//! The storage is an `rtrb` SPSC ring split into a [`SampleWriter`] (owned by
//! the decode thread) and a [`SampleReader`] (owned by the source, read from
//! the mixer thread). Data never goes through the mutex: it only guards the
//! closed/aborted flags and pairs with a condvar so either side can park
//! while the ring is full or empty.
//!
//! # Wakeup protocol
//!
//! A waiter checks its predicate (ring slots + flags) while holding the
//! mutex and parks atomically. The other side commits its chunk lock-free,
//! then takes the mutex before notifying, so a commit can never slip in
//! between a waiter's check and its park.
//!
//! Dropping the writer closes the ring: the reader drains what is left and
//! then reads return 0. The backing store is released once both halves are
//! gone, which the source guarantees by joining its threads first.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default ring size in bytes (1024 canonical stereo frames)
pub const DEFAULT_RING_BUFFER_BYTES: usize = 4096;

/// Behaviour of [`SampleWriter::write`] when the ring lacks free space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RingMode {
    /// Park until the reader frees space
    #[default]
    Blocking,
    /// Fail immediately with [`RingBufferError::Full`]
    NonBlocking,
}

/// Ring buffer write errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingBufferError {
    /// Not enough free space for a non-blocking write
    #[error("ring buffer full: {requested} bytes requested, {available} available")]
    Full { requested: usize, available: usize },

    /// The ring was aborted while (or before) waiting
    #[error("ring buffer aborted")]
    Aborted,
}

#[derive(Default)]
struct Flags {
    closed: bool,
    aborted: bool,
}

struct Signal {
    flags: Mutex<Flags>,
    cond: Condvar,
    capacity: usize,
}

impl Signal {
    fn lock(&self) -> MutexGuard<'_, Flags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        let _guard = self.lock();
        self.cond.notify_all();
    }

    fn set(&self, update: impl FnOnce(&mut Flags)) {
        update(&mut self.lock());
        self.cond.notify_all();
    }
}

/// Create a ring of `capacity` bytes (at least one)
pub fn sample_ring(capacity: usize, mode: RingMode) -> (SampleWriter, SampleReader) {
    let capacity = capacity.max(1);
    let (producer, consumer) = rtrb::RingBuffer::new(capacity);
    let signal = Arc::new(Signal {
        flags: Mutex::new(Flags::default()),
        cond: Condvar::new(),
        capacity,
    });

    (
        SampleWriter {
            producer,
            signal: signal.clone(),
            mode,
        },
        SampleReader { consumer, signal },
    )
}

/// Producer half, owned by the decode thread
pub struct SampleWriter {
    producer: rtrb::Producer<u8>,
    signal: Arc<Signal>,
    mode: RingMode,
}

impl SampleWriter {
    /// Append bytes to the ring
    ///
    /// In blocking mode, writes as much as fits and parks for the rest, so
    /// writes larger than the capacity stream through. Unread bytes are never
    /// overwritten. In non-blocking mode the write is all-or-nothing.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), RingBufferError> {
        if self.mode == RingMode::NonBlocking {
            let available = self.producer.slots();
            if self.is_aborted() {
                return Err(RingBufferError::Aborted);
            }
            if bytes.len() > available {
                return Err(RingBufferError::Full {
                    requested: bytes.len(),
                    available,
                });
            }
            self.push(bytes);
            return Ok(());
        }

        let mut written = 0;
        while written < bytes.len() {
            if !self.wait_for_space() {
                return Err(RingBufferError::Aborted);
            }
            let n = self.producer.slots().min(bytes.len() - written);
            self.push(&bytes[written..written + n]);
            written += n;
        }
        Ok(())
    }

    fn push(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        // Callers checked slots() >= bytes.len(); only this half writes
        if let Ok(mut chunk) = self.producer.write_chunk(bytes.len()) {
            let (first, second) = chunk.as_mut_slices();
            let split = first.len();
            first.copy_from_slice(&bytes[..split]);
            second.copy_from_slice(&bytes[split..]);
            chunk.commit_all();
        }
        self.signal.notify();
    }

    /// Park until at least one byte of space is free
    ///
    /// Returns `false` if the ring was aborted.
    pub fn wait_for_space(&self) -> bool {
        self.wait_for_space_of(1)
    }

    /// Park until `bytes` of space are free (clamped to the capacity)
    ///
    /// Returns `false` if the ring was aborted.
    pub fn wait_for_space_of(&self, bytes: usize) -> bool {
        let wanted = bytes.clamp(1, self.signal.capacity);
        let flags = self.signal.lock();
        let flags = self
            .signal
            .cond
            .wait_while(flags, |f| !f.aborted && self.producer.slots() < wanted)
            .unwrap_or_else(PoisonError::into_inner);
        !flags.aborted
    }

    /// Free space in bytes (a scheduling hint, may be stale)
    pub fn available(&self) -> usize {
        self.producer.slots()
    }

    /// Total capacity in bytes
    pub fn capacity(&self) -> usize {
        self.signal.capacity
    }

    /// Close the ring; the reader drains remaining bytes, then sees end
    pub fn close(&self) {
        self.signal.set(|f| f.closed = true);
    }

    /// Whether the ring was aborted
    pub fn is_aborted(&self) -> bool {
        self.signal.lock().aborted
    }
}

impl Drop for SampleWriter {
    fn drop(&mut self) {
        self.close();
    }
}

/// Consumer half, owned by the source and read from the mixer thread
pub struct SampleReader {
    consumer: rtrb::Consumer<u8>,
    signal: Arc<Signal>,
}

impl SampleReader {
    /// Copy up to `out.len()` bytes into `out`, parking while the ring is empty
    ///
    /// Returns 0 once the ring is aborted, or once it is closed and drained.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        if out.is_empty() {
            return 0;
        }

        loop {
            let used = self.consumer.slots();
            if used > 0 {
                let n = used.min(out.len());
                if let Ok(chunk) = self.consumer.read_chunk(n) {
                    let (first, second) = chunk.as_slices();
                    out[..first.len()].copy_from_slice(first);
                    out[first.len()..n].copy_from_slice(second);
                    chunk.commit_all();
                }
                self.signal.notify();
                return n;
            }

            let flags = self.signal.lock();
            let flags = self
                .signal
                .cond
                .wait_while(flags, |f| {
                    !f.aborted && !f.closed && self.consumer.slots() == 0
                })
                .unwrap_or_else(PoisonError::into_inner);

            if flags.aborted {
                return 0;
            }
            if flags.closed && self.consumer.slots() == 0 {
                return 0;
            }
        }
    }

    /// Readable bytes (a scheduling hint, may be stale)
    pub fn used(&self) -> usize {
        self.consumer.slots()
    }

    /// Total capacity in bytes
    pub fn capacity(&self) -> usize {
        self.signal.capacity
    }

    /// Whether the writer side has closed the ring
    pub fn is_closed(&self) -> bool {
        self.signal.lock().closed
    }

    /// Wake both halves and make every further wait return immediately
    pub fn abort(&self) {
        self.signal.set(|f| f.aborted = true);
    }
}
