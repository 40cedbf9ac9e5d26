//! Reader thread: demuxer to packet queue

use std::sync::Arc;
use std::thread::JoinHandle;

use super::{SourceShared, READ_END};
use crate::error::MixError;
use crate::media::Demuxer;
use crate::pipeline::PacketQueue;

pub(super) struct ReaderTask {
    pub demuxer: Box<dyn Demuxer>,
    pub stream_id: u32,
    pub queue: Arc<PacketQueue>,
    pub shared: Arc<SourceShared>,
    pub label: String,
}

impl ReaderTask {
    /// Route the tracked stream's units into the queue, then join the decoder
    pub fn run(mut self, decoder: JoinHandle<()>) {
        let mut units = 0u64;

        loop {
            if self.shared.is_aborted() {
                log::debug!("[{}] reader: aborted after {} units", self.label, units);
                break;
            }

            match self.demuxer.read_unit() {
                Ok(Some(unit)) => {
                    if unit.stream_id != self.stream_id {
                        continue;
                    }
                    if self.queue.put(unit).is_err() {
                        break;
                    }
                    units += 1;
                }
                Ok(None) => {
                    self.shared.set(READ_END);
                    // Sentinel goes in exactly once; an aborted queue refuses it
                    let _ = self.queue.put_null_packet(self.stream_id);
                    log::debug!("[{}] reader: end of input after {} units", self.label, units);
                    break;
                }
                Err(e) => {
                    self.shared.fail(&self.label, e);
                    self.queue.close();
                    break;
                }
            }
        }

        if decoder.join().is_err() {
            self.shared
                .fail(&self.label, MixError::Decode("decode thread panicked".to_string()));
        }
        log::debug!("[{}] reader: finished", self.label);
    }
}
