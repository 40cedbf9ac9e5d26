//! Conversion of decoded frames to the canonical PCM format
//!
//! Stereo, 44.1 kHz, signed 16-bit little-endian interleaved. Channel mapping
//! happens first (mono is duplicated, extra channels beyond front L/R are
//! dropped), then rate conversion through rubato when the source rate differs.
//! Sources already at 44.1 kHz skip the resampler and come out bit-exact.
//!
//! The resampler is built from the first frame's format. Later frames must
//! match it; a mid-stream change is rejected rather than silently rebuilt.

use rubato::{FftFixedIn, Resampler};

use crate::error::{MixError, MixResult};
use crate::types::{DecodedFrame, FrameFormat, BYTES_PER_FRAME, OUT_SAMPLE_RATE};

/// Extra frames added to the conversion upper bound
pub const RESAMPLE_HEADROOM: usize = 256;

/// Input chunk size for the FFT resampler
const CHUNK_FRAMES: usize = 1024;

/// Sub-chunks per FFT chunk (more = lower latency, higher CPU)
const SUB_CHUNKS: usize = 2;

/// Conservative upper bound for the converted frame count
pub fn max_output_frames(input_frames: usize, in_rate: u32, out_rate: u32) -> usize {
    if in_rate == 0 {
        return RESAMPLE_HEADROOM;
    }
    let scaled = input_frames as u64 * out_rate as u64;
    scaled.div_ceil(in_rate as u64) as usize + RESAMPLE_HEADROOM
}

/// Exact output length for a given input length
fn expected_output_frames(input_frames: u64, in_rate: u32) -> u64 {
    (input_frames * OUT_SAMPLE_RATE as u64).div_ceil(in_rate as u64)
}

#[inline]
fn to_i16(sample: f32) -> i16 {
    (sample * 32768.0).round().clamp(-32768.0, 32767.0) as i16
}

/// Converts one source's frames to canonical PCM bytes
pub struct CanonicalResampler {
    input: FrameFormat,
    /// `None` when the source is already at the output rate
    inner: Option<FftFixedIn<f32>>,
    /// Stereo input waiting for a full resampler chunk
    pending: [Vec<f32>; 2],
    /// Leading resampler output still to discard (filter delay)
    delay_remaining: usize,
    frames_in: u64,
    frames_out: u64,
    scratch: Vec<u8>,
}

impl CanonicalResampler {
    /// Build a converter for frames in `input` format
    pub fn new(input: FrameFormat) -> MixResult<Self> {
        if input.sample_rate == 0 || input.channels == 0 {
            return Err(MixError::ResampleInit(format!("invalid input format {}", input)));
        }

        let inner = if input.sample_rate == OUT_SAMPLE_RATE {
            None
        } else {
            let resampler = FftFixedIn::<f32>::new(
                input.sample_rate as usize,
                OUT_SAMPLE_RATE as usize,
                CHUNK_FRAMES,
                SUB_CHUNKS,
                2,
            )
            .map_err(|e| MixError::ResampleInit(e.to_string()))?;
            Some(resampler)
        };
        let delay_remaining = inner.as_ref().map(|r| r.output_delay()).unwrap_or(0);

        log::debug!(
            "CanonicalResampler: {} -> {}{}",
            input,
            FrameFormat::canonical(),
            if inner.is_some() { " (resampling)" } else { "" }
        );

        Ok(Self {
            input,
            inner,
            pending: [Vec::new(), Vec::new()],
            delay_remaining,
            frames_in: 0,
            frames_out: 0,
            scratch: Vec::new(),
        })
    }

    /// Convert a frame, returning the canonical bytes produced so far
    ///
    /// The returned slice may be empty while the resampler collects a chunk.
    pub fn convert(&mut self, frame: &DecodedFrame) -> MixResult<&[u8]> {
        if frame.format != self.input {
            return Err(MixError::UnsupportedFormatChange {
                from: self.input.to_string(),
                to: frame.format.to_string(),
            });
        }

        let frames = frame.frames();
        let bound = max_output_frames(
            frames + self.pending[0].len(),
            self.input.sample_rate,
            OUT_SAMPLE_RATE,
        );
        self.scratch.clear();
        self.scratch.reserve(bound * BYTES_PER_FRAME);
        self.frames_in += frames as u64;

        let (left, right) = stereo_planes(frame);

        if self.inner.is_none() {
            for (&l, &r) in left.iter().zip(right) {
                self.scratch.extend_from_slice(&to_i16(l).to_le_bytes());
                self.scratch.extend_from_slice(&to_i16(r).to_le_bytes());
            }
            self.frames_out += frames as u64;
            return Ok(&self.scratch);
        }

        self.pending[0].extend_from_slice(left);
        self.pending[1].extend_from_slice(right);
        self.process_full_chunks()?;
        Ok(&self.scratch)
    }

    /// Push buffered input and the filter tail through at end of stream
    pub fn flush(&mut self) -> MixResult<&[u8]> {
        self.scratch.clear();
        let Some(resampler) = self.inner.as_mut() else {
            return Ok(&self.scratch);
        };

        let mut outputs = Vec::new();
        if !self.pending[0].is_empty() {
            let waves = std::mem::take(&mut self.pending);
            outputs.push(
                resampler
                    .process_partial(Some(&waves[..]), None)
                    .map_err(|e| MixError::Resample(e.to_string()))?,
            );
        }

        let expected = expected_output_frames(self.frames_in, self.input.sample_rate);
        let mut produced = self.frames_out
            + outputs
                .iter()
                .map(|o| o[0].len().saturating_sub(self.delay_remaining) as u64)
                .sum::<u64>();
        // Empty partial calls flush the filter delay; a few rounds at most
        let mut rounds = 0;
        while produced < expected && rounds < 8 {
            let out = resampler
                .process_partial(None::<&[Vec<f32>]>, None)
                .map_err(|e| MixError::Resample(e.to_string()))?;
            if out[0].is_empty() {
                break;
            }
            produced += out[0].len() as u64;
            outputs.push(out);
            rounds += 1;
        }

        for out in outputs {
            self.emit(&out, expected);
        }
        Ok(&self.scratch)
    }

    fn process_full_chunks(&mut self) -> MixResult<()> {
        let expected = expected_output_frames(self.frames_in, self.input.sample_rate);
        loop {
            let Some(resampler) = self.inner.as_mut() else {
                return Ok(());
            };
            let needed = resampler.input_frames_next();
            if self.pending[0].len() < needed {
                return Ok(());
            }

            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|plane| plane.drain(..needed).collect())
                .collect();
            let out = resampler
                .process(&chunk[..], None)
                .map_err(|e| MixError::Resample(e.to_string()))?;
            self.emit(&out, expected);
        }
    }

    /// Interleave resampler output into scratch, trimming delay and overshoot
    fn emit(&mut self, out: &[Vec<f32>], limit: u64) {
        let available = out[0].len();
        let skip = self.delay_remaining.min(available);
        self.delay_remaining -= skip;

        let room = limit.saturating_sub(self.frames_out) as usize;
        let take = (available - skip).min(room);
        for i in skip..skip + take {
            self.scratch.extend_from_slice(&to_i16(out[0][i]).to_le_bytes());
            self.scratch.extend_from_slice(&to_i16(out[1][i]).to_le_bytes());
        }
        self.frames_out += take as u64;
    }
}

/// Map any channel count onto a left/right pair
fn stereo_planes(frame: &DecodedFrame) -> (&[f32], &[f32]) {
    match frame.planes.as_slice() {
        [] => (&[], &[]),
        [mono] => (mono.as_slice(), mono.as_slice()),
        [left, right, ..] => (left.as_slice(), right.as_slice()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SampleFormat;

    fn format(sample_rate: u32, channels: u16) -> FrameFormat {
        FrameFormat {
            sample_rate,
            channels,
            layout: 0,
            sample_format: SampleFormat::F32,
        }
    }

    fn frame(sample_rate: u32, planes: Vec<Vec<f32>>) -> DecodedFrame {
        DecodedFrame {
            format: format(sample_rate, planes.len() as u16),
            planes,
        }
    }

    fn samples(bytes: &[u8]) -> Vec<i16> {
        bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    #[test]
    fn test_max_output_frames() {
        assert_eq!(max_output_frames(1152, 44100, 44100), 1152 + 256);
        assert_eq!(max_output_frames(1024, 48000, 44100), 941 + 256);
        assert_eq!(max_output_frames(1000, 22050, 44100), 2000 + 256);
    }

    #[test]
    fn test_passthrough_is_bit_exact() {
        let mut rs = CanonicalResampler::new(format(44100, 2)).unwrap();
        let left = vec![0.5, -0.25, 0.0, -1.0];
        let right = vec![-0.5, 0.25, 1.0 / 32768.0, 0.999];
        let out = rs.convert(&frame(44100, vec![left, right])).unwrap();
        assert_eq!(
            samples(out),
            vec![16384, -16384, -8192, 8192, 0, 1, -32768, 32735]
        );
        assert!(rs.flush().unwrap().is_empty());
    }

    #[test]
    fn test_mono_is_duplicated() {
        let mut rs = CanonicalResampler::new(format(44100, 1)).unwrap();
        let out = rs.convert(&frame(44100, vec![vec![0.25, -0.5]])).unwrap();
        assert_eq!(samples(out), vec![8192, 8192, -16384, -16384]);
    }

    #[test]
    fn test_extra_channels_keep_front_pair() {
        let mut rs = CanonicalResampler::new(format(44100, 6)).unwrap();
        let planes = (0..6).map(|ch| vec![ch as f32 / 8.0]).collect();
        let out = rs.convert(&frame(44100, planes)).unwrap();
        assert_eq!(samples(out), vec![0, 4096]);
    }

    #[test]
    fn test_clipping_saturates() {
        let mut rs = CanonicalResampler::new(format(44100, 2)).unwrap();
        let out = rs.convert(&frame(44100, vec![vec![2.0], vec![-2.0]])).unwrap();
        assert_eq!(samples(out), vec![32767, -32768]);
    }

    #[test]
    fn test_format_change_is_rejected() {
        let mut rs = CanonicalResampler::new(format(44100, 2)).unwrap();
        rs.convert(&frame(44100, vec![vec![0.0], vec![0.0]])).unwrap();

        let err = rs.convert(&frame(48000, vec![vec![0.0], vec![0.0]])).err().unwrap();
        assert!(matches!(err, MixError::UnsupportedFormatChange { .. }));
    }

    #[test]
    fn test_invalid_format_fails_init() {
        assert!(matches!(
            CanonicalResampler::new(format(0, 2)),
            Err(MixError::ResampleInit(_))
        ));
    }

    #[test]
    fn test_upsampling_produces_exact_length() {
        let mut rs = CanonicalResampler::new(format(22050, 1)).unwrap();
        let mut total = 0;
        // 5 frames of 700 samples = 3500 input frames
        for n in 0..5 {
            let plane: Vec<f32> = (0..700)
                .map(|i| ((n * 700 + i) as f32 * 0.05).sin() * 0.5)
                .collect();
            total += rs.convert(&frame(22050, vec![plane])).unwrap().len();
        }
        total += rs.flush().unwrap().len();
        assert_eq!(total, 7000 * BYTES_PER_FRAME);
    }

    #[test]
    fn test_downsampling_produces_exact_length() {
        let mut rs = CanonicalResampler::new(format(48000, 2)).unwrap();
        let plane = vec![0.1f32; 4800];
        let mut total = rs
            .convert(&frame(48000, vec![plane.clone(), plane]))
            .unwrap()
            .len();
        total += rs.flush().unwrap().len();
        assert_eq!(total, 4410 * BYTES_PER_FRAME);
    }
}
