//! Symphonia-backed demuxer and decoder

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::{AudioBufferRef, SampleBuffer};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::{
    AudioDecoder, Demuxer, MediaBackend, OpenedInput, ReceiveStatus, StreamParams, SubmitStatus,
};
use crate::error::{MixError, MixResult};
use crate::types::{CompressedUnit, DecodedFrame, FrameFormat, SampleFormat};

/// Opens files with Symphonia's default probe and codec registry
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaBackend;

impl SymphoniaBackend {
    pub fn new() -> Self {
        Self
    }
}

impl MediaBackend for SymphoniaBackend {
    fn open_input(&self, path: &Path) -> MixResult<OpenedInput> {
        let display = path.display();
        let file = File::open(path).map_err(|e| MixError::open(&display, e))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint with the file extension
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| MixError::open(&display, e))?;
        let format = probed.format;

        let track = format
            .default_track()
            .filter(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .or_else(|| {
                format
                    .tracks()
                    .iter()
                    .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            })
            .ok_or_else(|| MixError::StreamNotFound(display.to_string()))?;

        let stream_id = track.id;
        let codec_params = track.codec_params.clone();
        let codec = symphonia::default::get_codecs()
            .get_codec(codec_params.codec)
            .map(|d| d.short_name.to_string())
            .unwrap_or_else(|| format!("{:?}", codec_params.codec));

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| match e {
                SymphoniaError::Unsupported(_) => MixError::CodecNotFound(codec.clone()),
                other => MixError::open(&display, other),
            })?;

        let params = StreamParams {
            codec,
            sample_rate: codec_params.sample_rate,
            channels: codec_params.channels.map(|c| c.count() as u16),
            frames: codec_params.n_frames,
        };

        log::info!(
            "SymphoniaBackend: opened {:?} (track {}, codec {}, {:?} Hz, {:?} ch)",
            path,
            stream_id,
            params.codec,
            params.sample_rate,
            params.channels
        );

        Ok(OpenedInput {
            demuxer: Box::new(SymphoniaDemuxer { format }),
            decoder: Box::new(SymphoniaDecoder {
                decoder,
                pending: None,
                draining: false,
            }),
            stream_id,
            params,
        })
    }
}

struct SymphoniaDemuxer {
    format: Box<dyn FormatReader>,
}

impl Demuxer for SymphoniaDemuxer {
    fn read_unit(&mut self) -> MixResult<Option<CompressedUnit>> {
        match self.format.next_packet() {
            Ok(packet) => Ok(Some(CompressedUnit::new(
                packet.track_id(),
                packet.ts(),
                packet.dur(),
                packet.data.into_vec(),
            ))),
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Ok(None)
            }
            Err(e) => Err(MixError::Read(e.to_string())),
        }
    }
}

/// Adapts Symphonia's one-call decode to the submit/receive contract
///
/// A decoded packet is parked in `pending` until received; submitting while
/// a frame is pending answers `Again`.
struct SymphoniaDecoder {
    decoder: Box<dyn Decoder>,
    pending: Option<DecodedFrame>,
    draining: bool,
}

impl AudioDecoder for SymphoniaDecoder {
    fn submit(&mut self, unit: Option<&CompressedUnit>) -> MixResult<SubmitStatus> {
        let Some(unit) = unit else {
            self.draining = true;
            return Ok(SubmitStatus::Accepted);
        };
        if self.pending.is_some() {
            return Ok(SubmitStatus::Again);
        }

        let packet = Packet::new_from_slice(unit.stream_id, unit.pts, unit.duration, &unit.payload);
        let decoded = self
            .decoder
            .decode(&packet)
            .map_err(|e| MixError::Decode(e.to_string()))?;

        let frame = frame_from_buffer(decoded);
        if !frame.is_empty() {
            self.pending = Some(frame);
        }
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
        self.decoder.reset();
        self.pending = None;
        self.draining = false;
    }
}

fn sample_format_of(buffer: &AudioBufferRef<'_>) -> SampleFormat {
    match buffer {
        AudioBufferRef::U8(_) => SampleFormat::U8,
        AudioBufferRef::U16(_) => SampleFormat::U16,
        AudioBufferRef::U24(_) => SampleFormat::U24,
        AudioBufferRef::U32(_) => SampleFormat::U32,
        AudioBufferRef::S8(_) => SampleFormat::S8,
        AudioBufferRef::S16(_) => SampleFormat::S16,
        AudioBufferRef::S24(_) => SampleFormat::S24,
        AudioBufferRef::S32(_) => SampleFormat::S32,
        AudioBufferRef::F32(_) => SampleFormat::F32,
        AudioBufferRef::F64(_) => SampleFormat::F64,
    }
}

/// Copy a decoder buffer into owned planar f32
fn frame_from_buffer(decoded: AudioBufferRef<'_>) -> DecodedFrame {
    let spec = *decoded.spec();
    let frames = decoded.frames();
    let channels = spec.channels.count();
    let format = FrameFormat {
        sample_rate: spec.rate,
        channels: channels as u16,
        layout: spec.channels.bits(),
        sample_format: sample_format_of(&decoded),
    };

    let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
    buf.copy_planar_ref(decoded);
    let samples = buf.samples();

    let planes = (0..channels)
        .map(|ch| samples[ch * frames..(ch + 1) * frames].to_vec())
        .collect();

    DecodedFrame { format, planes }
}
