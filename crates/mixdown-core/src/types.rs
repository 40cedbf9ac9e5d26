//! Common types for Mixdown
//!
//! The canonical PCM format every source is converted to, the compressed and
//! decoded units exchanged between pipeline stages, and time base arithmetic.

/// Output sample rate of the canonical PCM format
pub const OUT_SAMPLE_RATE: u32 = 44100;

/// Output channel count of the canonical PCM format (interleaved stereo)
pub const OUT_CHANNELS: u16 = 2;

/// Bytes per sample of the canonical PCM format (signed 16-bit)
pub const BYTES_PER_SAMPLE: usize = 2;

/// Bytes per interleaved stereo frame
pub const BYTES_PER_FRAME: usize = BYTES_PER_SAMPLE * OUT_CHANNELS as usize;

/// Sample storage format reported by a decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    U8,
    U16,
    U24,
    U32,
    S8,
    S16,
    S24,
    S32,
    F32,
    F64,
}

impl SampleFormat {
    /// Short lowercase name, ffmpeg style (`s16`, `f32`, ...)
    pub fn name(&self) -> &'static str {
        match self {
            SampleFormat::U8 => "u8",
            SampleFormat::U16 => "u16",
            SampleFormat::U24 => "u24",
            SampleFormat::U32 => "u32",
            SampleFormat::S8 => "s8",
            SampleFormat::S16 => "s16",
            SampleFormat::S24 => "s24",
            SampleFormat::S32 => "s32",
            SampleFormat::F32 => "f32",
            SampleFormat::F64 => "f64",
        }
    }
}

impl std::fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Format of a decoded frame as it leaves the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Channel layout bitmask (0 when the decoder doesn't report one)
    pub layout: u32,
    /// Storage format before conversion to f32
    pub sample_format: SampleFormat,
}

impl FrameFormat {
    /// The canonical output format: stereo, 44.1 kHz, signed 16-bit
    pub fn canonical() -> Self {
        Self {
            sample_rate: OUT_SAMPLE_RATE,
            channels: OUT_CHANNELS,
            layout: 0b11,
            sample_format: SampleFormat::S16,
        }
    }
}

impl std::fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}Hz/{}ch/{}",
            self.sample_rate, self.channels, self.sample_format
        )
    }
}

/// One demuxed chunk of encoded data for a single elementary stream
///
/// An empty payload with `end_of_stream` set is the sentinel that marks
/// stream exhaustion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedUnit {
    /// Elementary stream the unit belongs to
    pub stream_id: u32,
    /// Sequence tag, assigned by the queue on `put`
    pub sequence: u64,
    /// Presentation timestamp in the stream's time base
    pub pts: u64,
    /// Duration in the stream's time base
    pub duration: u64,
    /// Encoded payload
    pub payload: Vec<u8>,
    /// End-of-stream marker
    pub end_of_stream: bool,
}

impl CompressedUnit {
    /// Create a data unit
    pub fn new(stream_id: u32, pts: u64, duration: u64, payload: Vec<u8>) -> Self {
        Self {
            stream_id,
            sequence: 0,
            pts,
            duration,
            payload,
            end_of_stream: false,
        }
    }

    /// Create the end-of-stream sentinel for a stream
    pub fn sentinel(stream_id: u32) -> Self {
        Self {
            stream_id,
            sequence: 0,
            pts: 0,
            duration: 0,
            payload: Vec::new(),
            end_of_stream: true,
        }
    }

    /// True for the end-of-stream sentinel
    pub fn is_sentinel(&self) -> bool {
        self.end_of_stream && self.payload.is_empty()
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// A decoded frame: planar f32 samples plus the format they came in
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub format: FrameFormat,
    /// One plane per channel, all of equal length
    pub planes: Vec<Vec<f32>>,
}

impl DecodedFrame {
    /// Number of sample frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.planes.first().map(|p| p.len()).unwrap_or(0)
    }

    /// Check if the frame carries no samples
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }
}

/// Rational time base (seconds per tick = num / den)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    pub num: i64,
    pub den: i64,
}

impl TimeBase {
    pub const fn new(num: i64, den: i64) -> Self {
        Self { num, den }
    }

    /// One tick per sample at the given rate
    pub const fn per_sample(sample_rate: u32) -> Self {
        Self::new(1, sample_rate as i64)
    }
}

/// Rescale a timestamp between time bases, rounding to nearest (ties away from zero)
pub fn rescale(value: i64, from: TimeBase, to: TimeBase) -> i64 {
    if from == to {
        return value;
    }
    let num = value as i128 * from.num as i128 * to.den as i128;
    let den = from.den as i128 * to.num as i128;
    if den == 0 {
        return 0;
    }
    let half = den.abs() / 2;
    let rounded = if (num < 0) != (den < 0) {
        (num.abs() + half) / den.abs() * -1
    } else {
        (num.abs() + half) / den.abs()
    };
    rounded as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_is_empty_and_marked() {
        let unit = CompressedUnit::sentinel(3);
        assert!(unit.is_sentinel());
        assert_eq!(unit.stream_id, 3);
        assert_eq!(unit.size(), 0);

        let data = CompressedUnit::new(3, 0, 1152, vec![1, 2, 3]);
        assert!(!data.is_sentinel());
    }

    #[test]
    fn test_rescale_identity() {
        let tb = TimeBase::per_sample(44100);
        assert_eq!(rescale(12345, tb, tb), 12345);
    }

    #[test]
    fn test_rescale_to_milliseconds() {
        let samples = TimeBase::per_sample(44100);
        let millis = TimeBase::new(1, 1000);
        assert_eq!(rescale(44100, samples, millis), 1000);
        // 1024 samples = 23.219.. ms
        assert_eq!(rescale(1024, samples, millis), 23);
        // 1050 samples = 23.8 ms rounds up
        assert_eq!(rescale(1050, samples, millis), 24);
    }

    #[test]
    fn test_rescale_negative_rounds_away_from_zero() {
        let from = TimeBase::new(1, 2);
        let to = TimeBase::new(1, 1);
        assert_eq!(rescale(-3, from, to), -2);
        assert_eq!(rescale(3, from, to), 2);
    }

    #[test]
    fn test_frame_format_display() {
        assert_eq!(FrameFormat::canonical().to_string(), "44100Hz/2ch/s16");
    }
}
