//! Media capability: demuxing and decoding behind traits
//!
//! The pipeline never talks to a codec library directly. A [`MediaBackend`]
//! opens an input and hands back a [`Demuxer`] for the reader thread and an
//! [`AudioDecoder`] for the decode thread. The default backend is
//! [`SymphoniaBackend`].
//!
//! # Decoder contract
//!
//! ```text
//! submit(Some(unit)) ─► Accepted | Again (receive pending frames first, then retry)
//! submit(None)       ─► Accepted (drain mode)
//! receive()          ─► Frame | Again (needs more input) | End (fully drained)
//! ```

mod symphonia_backend;

#[cfg(test)]
pub(crate) mod mock;

use std::path::Path;

use crate::error::MixResult;
use crate::types::{CompressedUnit, DecodedFrame};

pub use symphonia_backend::SymphoniaBackend;

/// Result of submitting a unit to a decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    /// The decoder took the unit
    Accepted,
    /// Output is pending; receive frames, then submit the same unit again
    Again,
}

/// Result of asking a decoder for output
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiveStatus {
    /// A decoded frame
    Frame(DecodedFrame),
    /// Nothing pending, submit more input
    Again,
    /// Drain finished, no more frames will come
    End,
}

/// Reads compressed units from an opened input
pub trait Demuxer: Send {
    /// Next unit from any stream, `Ok(None)` at end of input
    fn read_unit(&mut self) -> MixResult<Option<CompressedUnit>>;
}

/// Decodes compressed units of one stream
pub trait AudioDecoder: Send {
    /// Submit a unit, or `None` to enter drain mode
    fn submit(&mut self, unit: Option<&CompressedUnit>) -> MixResult<SubmitStatus>;

    /// Fetch the next decoded frame
    fn receive(&mut self) -> MixResult<ReceiveStatus>;

    /// Reset internal decoder state
    fn flush(&mut self);
}

/// Informational parameters of the tracked stream
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamParams {
    pub codec: String,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    /// Total frames when the container knows it
    pub frames: Option<u64>,
}

/// An opened input: demuxer, decoder and the stream they track
pub struct OpenedInput {
    pub demuxer: Box<dyn Demuxer>,
    pub decoder: Box<dyn AudioDecoder>,
    pub stream_id: u32,
    pub params: StreamParams,
}

/// Opens inputs by path
pub trait MediaBackend: Send + Sync {
    /// Open the input, pick the best audio stream and open its decoder
    fn open_input(&self, path: &Path) -> MixResult<OpenedInput>;
}
