//! Scripted media backend for pipeline tests
//!
//! Payloads are raw little-endian i16 interleaved samples in the format the
//! input was created with. A payload equal to [`CORRUPT`] fails to decode.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{
    AudioDecoder, Demuxer, MediaBackend, OpenedInput, ReceiveStatus, StreamParams, SubmitStatus,
};
use crate::error::{MixError, MixResult};
use crate::types::{CompressedUnit, DecodedFrame, FrameFormat, SampleFormat};

/// Payload that makes the mock decoder fail
pub const CORRUPT: &[u8] = b"corrupt";

pub const STREAM: u32 = 1;

/// Encode interleaved i16 samples as a packet payload
pub fn pcm_payload(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

pub struct MockDemuxer {
    units: VecDeque<MixResult<CompressedUnit>>,
}

impl Demuxer for MockDemuxer {
    fn read_unit(&mut self) -> MixResult<Option<CompressedUnit>> {
        self.units.pop_front().transpose()
    }
}

pub struct MockDecoder {
    format: FrameFormat,
    pending: Option<DecodedFrame>,
    draining: bool,
}

impl AudioDecoder for MockDecoder {
    fn submit(&mut self, unit: Option<&CompressedUnit>) -> MixResult<SubmitStatus> {
        let Some(unit) = unit else {
            self.draining = true;
            return Ok(SubmitStatus::Accepted);
        };
        if self.pending.is_some() {
            return Ok(SubmitStatus::Again);
        }
        if unit.payload == CORRUPT {
            return Err(MixError::Decode(format!("corrupt unit #{}", unit.sequence)));
        }

        let channels = self.format.channels as usize;
        let samples: Vec<f32> = unit
            .payload
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
            .collect();
        let planes = (0..channels)
            .map(|ch| samples.iter().skip(ch).step_by(channels).copied().collect())
            .collect();
        self.pending = Some(DecodedFrame {
            format: self.format,
            planes,
        });
        Ok(SubmitStatus::Accepted)
    }

    fn receive(&mut self) -> MixResult<ReceiveStatus> {
        if let Some(frame) = self.pending.take() {
            return Ok(ReceiveStatus::Frame(frame));
        }
        if self.draining {
            return Ok(ReceiveStatus::End);
        }
        Ok(ReceiveStatus::Again)
    }

    fn flush(&mut self) {
        self.pending = None;
        self.draining = false;
    }
}

/// Build an input from packet payloads (canonical stereo 44.1 kHz)
pub fn mock_input(payloads: Vec<Vec<u8>>) -> OpenedInput {
    mock_input_with_format(payloads, 2, 44100)
}

pub fn mock_input_with_format(
    payloads: Vec<Vec<u8>>,
    channels: u16,
    sample_rate: u32,
) -> OpenedInput {
    let units = payloads
        .into_iter()
        .enumerate()
        .map(|(i, payload)| Ok(CompressedUnit::new(STREAM, i as u64, 0, payload)))
        .collect();
    mock_input_from_units(units, channels, sample_rate)
}

/// Build an input from a raw script of demuxer results
pub fn mock_input_from_units(
    units: VecDeque<MixResult<CompressedUnit>>,
    channels: u16,
    sample_rate: u32,
) -> OpenedInput {
    OpenedInput {
        demuxer: Box::new(MockDemuxer { units }),
        decoder: Box::new(MockDecoder {
            format: FrameFormat {
                sample_rate,
                channels,
                layout: 0,
                sample_format: SampleFormat::S16,
            },
            pending: None,
            draining: false,
        }),
        stream_id: STREAM,
        params: StreamParams {
            codec: "mock".to_string(),
            sample_rate: Some(sample_rate),
            channels: Some(channels),
            frames: None,
        },
    }
}

/// Backend serving scripted inputs by path
#[derive(Default)]
pub struct MockBackend {
    inputs: Mutex<HashMap<PathBuf, Vec<Vec<u8>>>>,
}

impl MockBackend {
    pub fn with_input(self, path: impl Into<PathBuf>, payloads: Vec<Vec<u8>>) -> Self {
        self.inputs
            .lock()
            .unwrap()
            .insert(path.into(), payloads);
        self
    }
}

impl MediaBackend for MockBackend {
    fn open_input(&self, path: &Path) -> MixResult<OpenedInput> {
        let payloads = self
            .inputs
            .lock()
            .unwrap()
            .remove(path)
            .ok_or_else(|| MixError::open(path.display(), "No such file"))?;
        Ok(mock_input(payloads))
    }
}
