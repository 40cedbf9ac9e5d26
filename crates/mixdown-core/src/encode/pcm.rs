//! Signed 16-bit little-endian PCM "encoder"

use super::{EncodeStatus, EncodedPacket, Encoder, EncoderParams, PcmFrame};
use crate::error::{MixError, MixResult};
use crate::media::SubmitStatus;
use crate::types::{TimeBase, BYTES_PER_SAMPLE};

/// Passes canonical PCM through as packets, one packet per frame
pub struct PcmEncoder {
    params: EncoderParams,
    pending: Option<EncodedPacket>,
    draining: bool,
}

impl PcmEncoder {
    pub const NAME: &'static str = "pcm_s16le";

    pub fn new(params: EncoderParams) -> MixResult<Self> {
        if params.sample_rate == 0 || params.channels == 0 || params.frame_size == 0 {
            return Err(MixError::Encode(format!("invalid encoder params {:?}", params)));
        }
        Ok(Self {
            params,
            pending: None,
            draining: false,
        })
    }

    fn bytes_per_frame(&self) -> usize {
        self.params.channels as usize * BYTES_PER_SAMPLE
    }
}

impl Encoder for PcmEncoder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn frame_size(&self) -> usize {
        self.params.frame_size
    }

    fn time_base(&self) -> TimeBase {
        TimeBase::per_sample(self.params.sample_rate)
    }

    fn params(&self) -> EncoderParams {
        self.params
    }

    fn submit(&mut self, frame: Option<PcmFrame<'_>>) -> MixResult<SubmitStatus> {
        let Some(frame) = frame else {
            self.draining = true;
            return Ok(SubmitStatus::Accepted);
        };
        if self.draining {
            return Err(MixError::Encode("frame submitted after drain".to_string()));
        }
        if self.pending.is_some() {
            return Ok(SubmitStatus::Again);
        }

        let bpf = self.bytes_per_frame();
        if frame.data.len() % bpf != 0 {
            return Err(MixError::Encode(format!(
                "{} bytes is not a whole number of {}-byte frames",
                frame.data.len(),
                bpf
            )));
        }
        if frame.data.is_empty() {
            return Ok(SubmitStatus::Accepted);
        }

        self.pending = Some(EncodedPacket {
            pts: frame.pts,
            duration: (frame.data.len() / bpf) as i64,
            data: frame.data.to_vec(),
        });
        Ok(SubmitStatus::Accepted)
    }

    fn receive(&mut self) -> MixResult<EncodeStatus> {
        if let Some(packet) = self.pending.take() {
            return Ok(EncodeStatus::Packet(packet));
        }
        if self.draining {
            return Ok(EncodeStatus::End);
        }
        Ok(EncodeStatus::Again)
    }
}
