//! Decode thread: packet queue to ring buffer

use std::sync::Arc;

use super::{SourceShared, AUDIO_END};
use crate::error::{MixError, MixResult};
use crate::media::{AudioDecoder, ReceiveStatus, SubmitStatus};
use crate::pipeline::{PacketQueue, RingBufferError, SampleWriter};
use crate::resample::CanonicalResampler;
use crate::types::{CompressedUnit, DecodedFrame};

/// Outcome of draining the decoder's pending frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drained {
    /// Decoder needs more input
    NeedInput,
    /// Decoder reported end of stream, tail written
    End,
    /// The ring was aborted under us
    Stopped,
}

pub(super) struct DecodeWorker {
    pub decoder: Box<dyn AudioDecoder>,
    pub queue: Arc<PacketQueue>,
    pub writer: SampleWriter,
    pub shared: Arc<SourceShared>,
    pub label: String,
    pub resampler: Option<CanonicalResampler>,
}

impl DecodeWorker {
    pub fn run(mut self) {
        match self.decode_loop() {
            Ok(()) => {}
            Err(e) if self.shared.is_aborted() => {
                log::debug!("[{}] decoder: error after abort ignored: {}", self.label, e);
            }
            Err(e) => self.shared.fail(&self.label, e),
        }

        // Wake a reader blocked in put; dropping the writer closes the ring
        self.queue.abort();
        log::debug!("[{}] decoder: finished", self.label);
    }

    fn decode_loop(&mut self) -> MixResult<()> {
        while !self.shared.is_aborted() {
            if !self.writer.wait_for_space() {
                return Ok(());
            }
            let Some(unit) = self.queue.get() else {
                return Ok(());
            };

            if unit.is_sentinel() {
                self.drain()?;
                return Ok(());
            }

            match self.decode_unit(&unit)? {
                Drained::NeedInput => {}
                Drained::End | Drained::Stopped => return Ok(()),
            }
        }
        Ok(())
    }

    fn decode_unit(&mut self, unit: &CompressedUnit) -> MixResult<Drained> {
        loop {
            match self.decoder.submit(Some(unit))? {
                SubmitStatus::Accepted => break,
                SubmitStatus::Again => match self.receive_frames()? {
                    Drained::NeedInput => {}
                    other => return Ok(other),
                },
            }
        }
        self.receive_frames()
    }

    fn drain(&mut self) -> MixResult<()> {
        self.decoder.submit(None)?;
        if self.receive_frames()? == Drained::NeedInput {
            // Decoder never reported End in drain mode; finish anyway
            self.finish()?;
        }
        Ok(())
    }

    fn receive_frames(&mut self) -> MixResult<Drained> {
        loop {
            match self.decoder.receive()? {
                ReceiveStatus::Frame(frame) => {
                    if !self.write_frame(&frame)? {
                        return Ok(Drained::Stopped);
                    }
                }
                ReceiveStatus::Again => return Ok(Drained::NeedInput),
                ReceiveStatus::End => {
                    self.finish()?;
                    return Ok(Drained::End);
                }
            }
        }
    }

    /// Resample and append one frame; `false` once the ring is aborted
    fn write_frame(&mut self, frame: &DecodedFrame) -> MixResult<bool> {
        let resampler = match &mut self.resampler {
            Some(resampler) => resampler,
            None => self.resampler.insert(CanonicalResampler::new(frame.format)?),
        };
        let bytes = resampler.convert(frame)?;
        write_ring(&mut self.writer, bytes)
    }

    /// Flush decoder state and the resampler tail, then mark end of audio
    fn finish(&mut self) -> MixResult<()> {
        self.decoder.flush();
        if let Some(resampler) = self.resampler.as_mut() {
            let tail = resampler.flush()?;
            write_ring(&mut self.writer, tail)?;
        }
        self.shared.set(AUDIO_END);
        log::debug!("[{}] decoder: end of stream", self.label);
        Ok(())
    }
}

/// Append a converted frame; `false` once the ring is aborted
///
/// A non-blocking ring that is still full is backpressure, not failure: park
/// until the reader has freed enough room and retry. Only a frame that can
/// never fit is an error.
fn write_ring(writer: &mut SampleWriter, bytes: &[u8]) -> MixResult<bool> {
    loop {
        match writer.write(bytes) {
            Ok(()) => return Ok(true),
            Err(RingBufferError::Aborted) => return Ok(false),
            Err(e @ RingBufferError::Full { requested, .. }) => {
                if requested > writer.capacity() {
                    return Err(MixError::Alloc(e.to_string()));
                }
                if !writer.wait_for_space_of(requested) {
                    return Ok(false);
                }
            }
        }
    }
}
