//! Encode Writer: PCM blocks in, container packets out

use std::path::{Path, PathBuf};

use super::{
    find_encoder, open_muxer, EncodeStatus, Encoder, EncoderParams, Muxer, PcmFrame, StreamInfo,
};
use crate::config::MixerConfig;
use crate::error::{MixError, MixResult};
use crate::media::SubmitStatus;
use crate::types::{rescale, BYTES_PER_FRAME, OUT_CHANNELS, OUT_SAMPLE_RATE};

/// Outcome of [`EncodeWriter::write_block`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// This many packets reached the container
    Written(usize),
    /// The encoder buffered the block, no packet yet
    NeedMoreInput,
}

/// Owns the encoder and muxer for one output file
///
/// Blocks are stamped with the running output sample count. Packets are
/// rescaled from the encoder's time base to the stream's before writing.
/// The trailer is written by [`finish`](Self::finish), or on drop if
/// `finish` was never reached.
pub struct EncodeWriter {
    path: PathBuf,
    encoder: Box<dyn Encoder>,
    muxer: Box<dyn Muxer>,
    stream: StreamInfo,
    /// Output samples per channel submitted so far
    samples: u64,
    packets: u64,
    finished: bool,
}

impl EncodeWriter {
    /// Open the output: muxer by extension, encoder by name, then the header
    pub fn open(path: &Path, config: &MixerConfig) -> MixResult<Self> {
        let muxer = open_muxer(path)?;
        let encoder = find_encoder(
            &config.encoder,
            EncoderParams {
                sample_rate: OUT_SAMPLE_RATE,
                channels: OUT_CHANNELS,
                frame_size: config.frame_size,
            },
        )?;
        Self::with_parts(path, encoder, muxer)
    }

    /// Assemble a writer from an already opened encoder and muxer
    pub fn with_parts(
        path: &Path,
        encoder: Box<dyn Encoder>,
        mut muxer: Box<dyn Muxer>,
    ) -> MixResult<Self> {
        let stream = muxer.add_stream(encoder.as_ref())?;
        muxer.write_header()?;
        log::info!(
            "EncodeWriter: {:?} ({}, frame size {})",
            path,
            encoder.name(),
            encoder.frame_size()
        );

        Ok(Self {
            path: path.to_path_buf(),
            encoder,
            muxer,
            stream,
            samples: 0,
            packets: 0,
            finished: false,
        })
    }

    /// Samples per channel the encoder wants per block
    pub fn frame_size(&self) -> usize {
        self.encoder.frame_size()
    }

    /// Bytes in one full block of canonical PCM
    pub fn block_bytes(&self) -> usize {
        self.frame_size() * BYTES_PER_FRAME
    }

    pub fn packets_written(&self) -> u64 {
        self.packets
    }

    /// Encode one block of canonical PCM
    pub fn write_block(&mut self, block: &[u8]) -> MixResult<WriteStatus> {
        if self.finished {
            return Err(MixError::InvalidState("writer already finished".to_string()));
        }
        if block.len() % BYTES_PER_FRAME != 0 {
            return Err(MixError::Encode(format!(
                "block of {} bytes is not whole frames",
                block.len()
            )));
        }

        let frame = PcmFrame {
            pts: self.samples as i64,
            data: block,
        };
        let mut written = 0;
        loop {
            match self.encoder.submit(Some(frame))? {
                SubmitStatus::Accepted => break,
                SubmitStatus::Again => written += self.drain_packets()?,
            }
        }
        self.samples += (block.len() / BYTES_PER_FRAME) as u64;
        written += self.drain_packets()?;

        if written == 0 {
            Ok(WriteStatus::NeedMoreInput)
        } else {
            Ok(WriteStatus::Written(written))
        }
    }

    /// Write every packet the encoder has ready
    fn drain_packets(&mut self) -> MixResult<usize> {
        let mut written = 0;
        loop {
            match self.encoder.receive()? {
                EncodeStatus::Packet(mut packet) => {
                    let from = self.encoder.time_base();
                    packet.pts = rescale(packet.pts, from, self.stream.time_base);
                    packet.duration = rescale(packet.duration, from, self.stream.time_base);
                    self.muxer.write_packet(self.stream.index, &packet)?;
                    self.packets += 1;
                    written += 1;
                }
                EncodeStatus::Again | EncodeStatus::End => return Ok(written),
            }
        }
    }

    /// Drain the encoder and write the trailer
    ///
    /// The trailer is attempted even when draining fails. Returns the number
    /// of samples per channel written. Later calls are no-ops.
    pub fn finish(&mut self) -> MixResult<u64> {
        if self.finished {
            return Ok(self.samples);
        }
        self.finished = true;
        let drained = self
            .encoder
            .submit(None)
            .and_then(|_| self.drain_packets());
        let trailer = self.muxer.write_trailer();

        drained?;
        trailer?;
        log::info!(
            "EncodeWriter: finished {:?} ({} samples, {} packets)",
            self.path,
            self.samples,
            self.packets
        );
        Ok(self.samples)
    }
}

impl Drop for EncodeWriter {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.muxer.write_trailer() {
                log::error!("EncodeWriter: trailer on drop failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{EncodedPacket, PcmEncoder};
    use crate::types::TimeBase;
    use std::sync::{Arc, Mutex};

    /// Records packets instead of writing a file
    #[derive(Clone, Default)]
    struct RecordingMuxer {
        packets: Arc<Mutex<Vec<EncodedPacket>>>,
        trailer: Arc<Mutex<bool>>,
        time_base: Option<TimeBase>,
    }

    impl Muxer for RecordingMuxer {
        fn add_stream(&mut self, encoder: &dyn Encoder) -> MixResult<StreamInfo> {
            Ok(StreamInfo {
                index: 0,
                time_base: self.time_base.unwrap_or_else(|| encoder.time_base()),
            })
        }

        fn write_header(&mut self) -> MixResult<()> {
            Ok(())
        }

        fn write_packet(&mut self, _stream: usize, packet: &EncodedPacket) -> MixResult<()> {
            self.packets.lock().unwrap().push(packet.clone());
            Ok(())
        }

        fn write_trailer(&mut self) -> MixResult<()> {
            *self.trailer.lock().unwrap() = true;
            Ok(())
        }
    }

    fn pcm(frame_size: usize) -> Box<dyn Encoder> {
        Box::new(
            PcmEncoder::new(EncoderParams {
                sample_rate: 44100,
                channels: 2,
                frame_size,
            })
            .unwrap(),
        )
    }

    #[test]
    fn test_blocks_are_stamped_with_running_sample_count() {
        let muxer = RecordingMuxer::default();
        let packets = muxer.packets.clone();
        let mut writer =
            EncodeWriter::with_parts(Path::new("mem.wav"), pcm(4), Box::new(muxer)).unwrap();

        assert_eq!(writer.block_bytes(), 16);
        assert_eq!(writer.write_block(&[0u8; 16]).unwrap(), WriteStatus::Written(1));
        assert_eq!(writer.write_block(&[0u8; 8]).unwrap(), WriteStatus::Written(1));
        assert_eq!(writer.write_block(&[0u8; 16]).unwrap(), WriteStatus::Written(1));
        assert_eq!(writer.finish().unwrap(), 10);
        assert_eq!(writer.finish().unwrap(), 10);
        assert!(matches!(
            writer.write_block(&[0u8; 16]),
            Err(MixError::InvalidState(_))
        ));

        let pts: Vec<i64> = packets.lock().unwrap().iter().map(|p| p.pts).collect();
        assert_eq!(pts, vec![0, 4, 6]);
    }

    #[test]
    fn test_packet_timestamps_are_rescaled() {
        let muxer = RecordingMuxer {
            time_base: Some(TimeBase::new(1, 1000)),
            ..Default::default()
        };
        let packets = muxer.packets.clone();
        let mut writer =
            EncodeWriter::with_parts(Path::new("mem.wav"), pcm(1024), Box::new(muxer)).unwrap();

        writer.write_block(&vec![0u8; 1024 * 4]).unwrap();
        writer.write_block(&vec![0u8; 1024 * 4]).unwrap();
        writer.finish().unwrap();

        let packets = packets.lock().unwrap();
        // 1024 samples at 44.1 kHz = 23.2 ms
        assert_eq!(packets[0].pts, 0);
        assert_eq!(packets[1].pts, 23);
        assert_eq!(packets[1].duration, 23);
    }

    #[test]
    fn test_empty_block_needs_more_input() {
        let mut writer = EncodeWriter::with_parts(
            Path::new("mem.wav"),
            pcm(4),
            Box::new(RecordingMuxer::default()),
        )
        .unwrap();
        assert_eq!(writer.write_block(&[]).unwrap(), WriteStatus::NeedMoreInput);
    }

    #[test]
    fn test_drop_writes_trailer() {
        let muxer = RecordingMuxer::default();
        let trailer = muxer.trailer.clone();
        let writer =
            EncodeWriter::with_parts(Path::new("mem.wav"), pcm(4), Box::new(muxer)).unwrap();
        drop(writer);
        assert!(*trailer.lock().unwrap());
    }

    #[test]
    fn test_open_rejects_unknown_encoder() {
        let dir = tempfile::tempdir().unwrap();
        let config = MixerConfig {
            encoder: "flac".to_string(),
            ..Default::default()
        };
        let err = EncodeWriter::open(&dir.path().join("out.wav"), &config).err();
        assert_eq!(err, Some(MixError::EncoderNotFound("flac".to_string())));
    }

    #[test]
    fn test_open_empty_output_is_valid_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let mut writer = EncodeWriter::open(&path, &MixerConfig::default()).unwrap();
        assert_eq!(writer.frame_size(), 1024);
        assert_eq!(writer.finish().unwrap(), 0);

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.duration(), 0);
    }
}
