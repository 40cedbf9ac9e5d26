//! Source: one input file with its reader and decode threads
//!
//! ```text
//! ┌─────────────┐  put   ┌─────────────┐  get   ┌──────────────┐ write ┌────────────┐
//! │ reader      │ ─────► │ PacketQueue │ ─────► │ decode       │ ────► │ RingBuffer │ ─► get_samples()
//! │ thread      │        └─────────────┘        │ thread       │       └────────────┘
//! └─────────────┘ joins decode thread on exit   └──────────────┘
//! ```
//!
//! The source owns both threads. `stop()` sets the abort flag, wakes every
//! blocking wait in the queue and ring, and joins the reader thread, which in
//! turn has joined the decode thread. Failures inside either thread are kept
//! (first one wins) and returned from [`Source::get_samples`] once the PCM
//! decoded before the failure has been read.

mod decode;
mod reader;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use decode::DecodeWorker;
use reader::ReaderTask;

use crate::config::MixerConfig;
use crate::error::{MixError, MixResult};
use crate::media::{AudioDecoder, Demuxer, OpenedInput, StreamParams};
use crate::pipeline::{sample_ring, PacketQueue, SampleReader, SampleWriter};

/// Reader reached end of input and queued the sentinel
pub(crate) const READ_END: u32 = 1 << 0;
/// Decoder drained and wrote its last PCM
pub(crate) const AUDIO_END: u32 = 1 << 1;

/// State shared between a source and its two threads
pub(crate) struct SourceShared {
    aborted: AtomicBool,
    flags: AtomicU32,
    failure: Mutex<Option<MixError>>,
}

impl SourceShared {
    fn new() -> Self {
        Self {
            aborted: AtomicBool::new(false),
            flags: AtomicU32::new(0),
            failure: Mutex::new(None),
        }
    }

    pub(crate) fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    pub(crate) fn set(&self, flag: u32) {
        self.flags.fetch_or(flag, Ordering::AcqRel);
    }

    pub(crate) fn has(&self, flag: u32) -> bool {
        self.flags.load(Ordering::Acquire) & flag != 0
    }

    /// Record a failure; later failures are logged and dropped
    pub(crate) fn fail(&self, label: &str, error: MixError) {
        let mut slot = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            log::error!("[{}] source failed: {}", label, error);
            *slot = Some(error);
        } else {
            log::debug!("[{}] additional failure ignored: {}", label, error);
        }
    }

    pub(crate) fn failure(&self) -> Option<MixError> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Externally visible lifecycle of a source
#[derive(Debug, Clone, PartialEq)]
pub enum SourceStatus {
    /// Constructed, threads not started
    Idle,
    /// Threads running (or finished reading, PCM still buffered)
    Running,
    /// Decoder reached end of stream cleanly
    Ended,
    /// A thread recorded a failure
    Failed(MixError),
    /// Stopped before reaching end of stream
    Stopped,
}

/// Halves handed to the threads on start
struct Parts {
    demuxer: Box<dyn Demuxer>,
    decoder: Box<dyn AudioDecoder>,
    writer: SampleWriter,
}

/// One input with its reader/decoder thread pair
pub struct Source {
    label: String,
    stream_id: u32,
    params: StreamParams,
    shared: Arc<SourceShared>,
    queue: Arc<PacketQueue>,
    ring: SampleReader,
    parts: Option<Parts>,
    reader_thread: Option<JoinHandle<()>>,
    started: bool,
    stopped: bool,
}

impl Source {
    /// Build a source from an opened input; no threads run until [`start`](Self::start)
    pub fn new(label: impl Into<String>, input: OpenedInput, config: &MixerConfig) -> Self {
        let (writer, ring) = sample_ring(config.ring_buffer_bytes, config.ring_buffer_mode);
        Self {
            label: label.into(),
            stream_id: input.stream_id,
            params: input.params,
            shared: Arc::new(SourceShared::new()),
            queue: Arc::new(PacketQueue::new(config.packet_queue_capacity)),
            ring,
            parts: Some(Parts {
                demuxer: input.demuxer,
                decoder: input.decoder,
                writer,
            }),
            reader_thread: None,
            started: false,
            stopped: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn params(&self) -> &StreamParams {
        &self.params
    }

    /// Spawn the decode thread, then the reader thread that owns its handle
    pub fn start(&mut self) -> MixResult<()> {
        let Some(parts) = self.parts.take() else {
            return Err(MixError::InvalidState(format!(
                "source '{}' already started",
                self.label
            )));
        };

        let worker = DecodeWorker {
            decoder: parts.decoder,
            queue: self.queue.clone(),
            writer: parts.writer,
            shared: self.shared.clone(),
            label: self.label.clone(),
            resampler: None,
        };
        let decode_handle = thread::Builder::new()
            .name(format!("decode:{}", self.label))
            .spawn(move || worker.run())
            .map_err(|e| MixError::Alloc(format!("Failed to spawn decode thread: {}", e)))?;

        let task = ReaderTask {
            demuxer: parts.demuxer,
            stream_id: self.stream_id,
            queue: self.queue.clone(),
            shared: self.shared.clone(),
            label: self.label.clone(),
        };
        let spawned = thread::Builder::new()
            .name(format!("reader:{}", self.label))
            .spawn(move || task.run(decode_handle));

        match spawned {
            Ok(handle) => {
                self.reader_thread = Some(handle);
                self.started = true;
                log::info!("[{}] source started", self.label);
                Ok(())
            }
            Err(e) => {
                // Decode thread sees the abort and exits on its own
                self.shared.abort();
                self.queue.abort();
                self.ring.abort();
                self.stopped = true;
                Err(MixError::Alloc(format!("Failed to spawn reader thread: {}", e)))
            }
        }
    }

    /// Read up to `out.len()` bytes of canonical PCM
    ///
    /// Blocks while the ring is empty and the decoder is still running.
    /// Returns `Ok(None)` at clean end of stream, or the recorded failure once
    /// everything decoded before it has been read.
    pub fn get_samples(&mut self, out: &mut [u8]) -> MixResult<Option<usize>> {
        if !self.started {
            return Err(MixError::InvalidState(format!(
                "source '{}' not started",
                self.label
            )));
        }

        let n = self.ring.read(out);
        if n > 0 {
            return Ok(Some(n));
        }
        match self.shared.failure() {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    /// Fill `block` as far as the stream allows, returning the bytes written
    ///
    /// A short count means end of stream. A failure after some bytes were
    /// copied is deferred to the next call.
    pub fn fill(&mut self, block: &mut [u8]) -> MixResult<usize> {
        let mut filled = 0;
        while filled < block.len() {
            match self.get_samples(&mut block[filled..]) {
                Ok(Some(n)) => filled += n,
                Ok(None) => break,
                Err(e) if filled == 0 => return Err(e),
                Err(_) => break,
            }
        }
        Ok(filled)
    }

    pub fn status(&self) -> SourceStatus {
        if let Some(e) = self.shared.failure() {
            SourceStatus::Failed(e)
        } else if self.shared.has(AUDIO_END) {
            SourceStatus::Ended
        } else if self.stopped {
            SourceStatus::Stopped
        } else if self.started {
            SourceStatus::Running
        } else {
            SourceStatus::Idle
        }
    }

    /// Reader reached end of input (the decoder may still be working)
    pub fn is_read_complete(&self) -> bool {
        self.shared.has(READ_END)
    }

    /// Abort both threads and join them; safe to call more than once
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        self.shared.abort();
        self.queue.abort();
        self.ring.abort();

        if let Some(handle) = self.reader_thread.take() {
            if handle.join().is_err() {
                log::error!("[{}] reader thread panicked", self.label);
            }
        }
        self.queue.flush();
        log::info!("[{}] source stopped", self.label);
    }
}

impl Drop for Source {
    fn drop(&mut self) {
        self.stop();
    }
}
