//! Output capability: encoders, containers and the Encode Writer
//!
//! Mirrors the decode side. An [`Encoder`] follows the same submit/receive
//! retry contract as [`AudioDecoder`](crate::media::AudioDecoder); a
//! [`Muxer`] writes the encoded packets to the output container.
//!
//! Built in: the `pcm_s16le` encoder and a WAV container (via hound).

mod pcm;
mod wav;
mod writer;

use std::path::Path;

use crate::error::{MixError, MixResult};
use crate::media::SubmitStatus;
use crate::types::TimeBase;

pub use pcm::PcmEncoder;
pub use wav::WavMuxer;
pub use writer::{EncodeWriter, WriteStatus};

/// Canonical PCM handed to an encoder
#[derive(Debug, Clone, Copy)]
pub struct PcmFrame<'a> {
    /// Presentation timestamp in the encoder's time base
    pub pts: i64,
    /// Interleaved s16le stereo bytes
    pub data: &'a [u8],
}

/// One encoded packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPacket {
    pub pts: i64,
    pub duration: i64,
    pub data: Vec<u8>,
}

/// Result of asking an encoder for output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeStatus {
    Packet(EncodedPacket),
    /// Nothing pending, submit more input
    Again,
    /// Drain finished
    End,
}

/// Parameters an encoder is opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderParams {
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per channel the encoder wants per frame
    pub frame_size: usize,
}

pub trait Encoder: Send {
    fn name(&self) -> &str;

    /// Samples per channel per submitted frame
    fn frame_size(&self) -> usize;

    fn time_base(&self) -> TimeBase;

    fn params(&self) -> EncoderParams;

    /// Submit a frame, or `None` to drain
    fn submit(&mut self, frame: Option<PcmFrame<'_>>) -> MixResult<SubmitStatus>;

    fn receive(&mut self) -> MixResult<EncodeStatus>;
}

/// A stream registered with a muxer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub index: usize,
    pub time_base: TimeBase,
}

pub trait Muxer: Send {
    /// Register an output stream for packets of `encoder`
    fn add_stream(&mut self, encoder: &dyn Encoder) -> MixResult<StreamInfo>;

    fn write_header(&mut self) -> MixResult<()>;

    /// Write a packet whose timestamps are in the stream's time base
    fn write_packet(&mut self, stream: usize, packet: &EncodedPacket) -> MixResult<()>;

    /// Finish the container; further writes fail
    fn write_trailer(&mut self) -> MixResult<()>;
}

/// Look up an encoder by name and open it
pub fn find_encoder(name: &str, params: EncoderParams) -> MixResult<Box<dyn Encoder>> {
    match name {
        PcmEncoder::NAME => Ok(Box::new(PcmEncoder::new(params)?)),
        other => Err(MixError::EncoderNotFound(other.to_string())),
    }
}

/// Allocate a muxer for the container implied by the path's extension
pub fn open_muxer(path: &Path) -> MixResult<Box<dyn Muxer>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("wav") | Some("wave") => Ok(Box::new(WavMuxer::new(path))),
        Some(other) => Err(MixError::UnsupportedContainer(other.to_string())),
        None => Err(MixError::UnsupportedContainer(path.display().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> EncoderParams {
        EncoderParams {
            sample_rate: 44100,
            channels: 2,
            frame_size: 1024,
        }
    }

    #[test]
    fn test_find_encoder() {
        let encoder = find_encoder("pcm_s16le", params()).unwrap();
        assert_eq!(encoder.name(), "pcm_s16le");
        assert_eq!(encoder.frame_size(), 1024);

        assert_eq!(
            find_encoder("libmp3lame", params()).err(),
            Some(MixError::EncoderNotFound("libmp3lame".to_string()))
        );
    }

    #[test]
    fn test_open_muxer_by_extension() {
        assert!(open_muxer(Path::new("/tmp/out.WAV")).is_ok());
        assert_eq!(
            open_muxer(Path::new("/tmp/out.mp3")).err(),
            Some(MixError::UnsupportedContainer("mp3".to_string()))
        );
        assert!(matches!(
            open_muxer(Path::new("/tmp/out")),
            Err(MixError::UnsupportedContainer(_))
        ));
    }
}
