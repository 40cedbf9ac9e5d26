//! WAV (RIFF) container via hound

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use hound::{SampleFormat as WavFormat, WavSpec, WavWriter};

use super::{EncodedPacket, Encoder, Muxer, PcmEncoder, StreamInfo};
use crate::error::{MixError, MixResult};
use crate::types::TimeBase;

/// Single-stream WAV writer
///
/// The file is created on `write_header` and the RIFF sizes are patched on
/// `write_trailer`. Packets must carry strictly increasing timestamps.
pub struct WavMuxer {
    path: PathBuf,
    spec: Option<WavSpec>,
    writer: Option<WavWriter<BufWriter<File>>>,
    last_pts: Option<i64>,
    trailer_written: bool,
}

impl WavMuxer {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            spec: None,
            writer: None,
            last_pts: None,
            trailer_written: false,
        }
    }

    fn write_error(&self, e: impl std::fmt::Display) -> MixError {
        MixError::Write(format!("{}: {}", self.path.display(), e))
    }
}

impl Muxer for WavMuxer {
    fn add_stream(&mut self, encoder: &dyn Encoder) -> MixResult<StreamInfo> {
        if self.spec.is_some() {
            return Err(MixError::Write("WAV holds a single stream".to_string()));
        }
        if encoder.name() != PcmEncoder::NAME {
            return Err(MixError::Write(format!(
                "WAV cannot carry '{}' packets",
                encoder.name()
            )));
        }

        let params = encoder.params();
        self.spec = Some(WavSpec {
            channels: params.channels,
            sample_rate: params.sample_rate,
            bits_per_sample: 16,
            sample_format: WavFormat::Int,
        });
        Ok(StreamInfo {
            index: 0,
            time_base: TimeBase::per_sample(params.sample_rate),
        })
    }

    fn write_header(&mut self) -> MixResult<()> {
        let Some(spec) = self.spec else {
            return Err(MixError::Write("no stream added before header".to_string()));
        };
        let writer = WavWriter::create(&self.path, spec).map_err(|e| self.write_error(e))?;
        self.writer = Some(writer);
        log::debug!("WavMuxer: header written to {:?}", self.path);
        Ok(())
    }

    fn write_packet(&mut self, stream: usize, packet: &EncodedPacket) -> MixResult<()> {
        if stream != 0 {
            return Err(MixError::Write(format!("unknown stream {}", stream)));
        }
        if let Some(last) = self.last_pts {
            if packet.pts <= last {
                return Err(MixError::Write(format!(
                    "non-monotonic timestamp {} after {}",
                    packet.pts, last
                )));
            }
        }

        let Some(writer) = self.writer.as_mut() else {
            return Err(MixError::Write("packet written outside header/trailer".to_string()));
        };
        let result = packet
            .data
            .chunks_exact(2)
            .try_for_each(|b| writer.write_sample(i16::from_le_bytes([b[0], b[1]])));
        result.map_err(|e| self.write_error(e))?;

        self.last_pts = Some(packet.pts);
        Ok(())
    }

    fn write_trailer(&mut self) -> MixResult<()> {
        if self.trailer_written {
            return Ok(());
        }
        self.trailer_written = true;
        match self.writer.take() {
            Some(writer) => writer.finalize().map_err(|e| self.write_error(e)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::EncoderParams;

    fn encoder() -> PcmEncoder {
        PcmEncoder::new(EncoderParams {
            sample_rate: 44100,
            channels: 2,
            frame_size: 2,
        })
        .unwrap()
    }

    fn packet(pts: i64, samples: &[i16]) -> EncodedPacket {
        EncodedPacket {
            pts,
            duration: samples.len() as i64 / 2,
            data: samples.iter().flat_map(|s| s.to_le_bytes()).collect(),
        }
    }

    #[test]
    fn test_packets_land_in_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");

        let mut muxer = WavMuxer::new(&path);
        let stream = muxer.add_stream(&encoder()).unwrap();
        assert_eq!(stream.time_base, TimeBase::new(1, 44100));
        muxer.write_header().unwrap();
        muxer.write_packet(0, &packet(0, &[1, 2, 3, 4])).unwrap();
        muxer.write_packet(0, &packet(2, &[5, 6])).unwrap();
        muxer.write_trailer().unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 44100);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_non_monotonic_timestamp_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut muxer = WavMuxer::new(&dir.path().join("out.wav"));
        muxer.add_stream(&encoder()).unwrap();
        muxer.write_header().unwrap();
        muxer.write_packet(0, &packet(4, &[0, 0])).unwrap();

        assert!(matches!(
            muxer.write_packet(0, &packet(4, &[0, 0])),
            Err(MixError::Write(_))
        ));
        assert!(matches!(
            muxer.write_packet(0, &packet(1, &[0, 0])),
            Err(MixError::Write(_))
        ));
        muxer.write_trailer().unwrap();
    }

    #[test]
    fn test_empty_file_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        let mut muxer = WavMuxer::new(&path);
        muxer.add_stream(&encoder()).unwrap();
        muxer.write_header().unwrap();
        muxer.write_trailer().unwrap();
        muxer.write_trailer().unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.duration(), 0);
    }

    #[test]
    fn test_header_into_missing_directory_fails() {
        let mut muxer = WavMuxer::new(Path::new("/nonexistent/dir/out.wav"));
        muxer.add_stream(&encoder()).unwrap();
        assert!(matches!(muxer.write_header(), Err(MixError::Write(_))));
    }
}
