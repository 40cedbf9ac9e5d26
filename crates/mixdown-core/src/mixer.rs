//! Mixer: owns the sources and drives the mix loop
//!
//! ```text
//! Idle ──add()──► Idle ──mix()──► Mixing ──► Finished | Failed
//! ```
//!
//! `mix()` runs on the calling thread. It pulls fixed-size blocks of
//! canonical PCM from the sources according to the configured
//! [`MixStrategy`] and hands them to the [`EncodeWriter`]. However the loop
//! ends, the output is finalized and every source is stopped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam::channel::Receiver;

use crate::config::{MixStrategy, MixerConfig};
use crate::encode::EncodeWriter;
use crate::error::{MixError, MixResult};
use crate::events::{EventBus, MixEvent};
use crate::media::{MediaBackend, OpenedInput, SymphoniaBackend};
use crate::source::{Source, SourceStatus};
use crate::types::BYTES_PER_SAMPLE;

/// Totals of a finished mix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MixSummary {
    /// Blocks handed to the encoder
    pub blocks: u64,
    /// Output samples per channel
    pub samples: u64,
    /// Packets written to the container
    pub packets: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixerState {
    /// Accepting sources
    Idle,
    Mixing,
    Finished,
    Failed,
}

pub struct Mixer {
    config: MixerConfig,
    backend: Arc<dyn MediaBackend>,
    sources: Vec<Source>,
    state: MixerState,
    events: EventBus,
}

impl Mixer {
    /// Create a mixer that opens inputs with Symphonia
    pub fn new(config: MixerConfig) -> Self {
        Self::with_backend(config, Arc::new(SymphoniaBackend::new()))
    }

    pub fn with_backend(config: MixerConfig, backend: Arc<dyn MediaBackend>) -> Self {
        Self {
            config,
            backend,
            sources: Vec::new(),
            state: MixerState::Idle,
            events: EventBus::default(),
        }
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    pub fn state(&self) -> MixerState {
        self.state
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Receiver for lifecycle events
    pub fn subscribe(&self) -> Receiver<MixEvent> {
        self.events.subscribe()
    }

    /// Open an input file, start its threads and append it
    ///
    /// Errors leave previously added sources untouched.
    pub fn add(&mut self, path: impl AsRef<Path>) -> MixResult<usize> {
        self.ensure_idle("add")?;
        let path = path.as_ref();
        let input = self.backend.open_input(path)?;
        self.add_input(path.display().to_string(), input)
    }

    /// Append an already opened input and start its threads
    pub fn add_input(&mut self, label: impl Into<String>, input: OpenedInput) -> MixResult<usize> {
        self.ensure_idle("add")?;
        let mut source = Source::new(label, input, &self.config);
        source.start()?;

        let index = self.sources.len();
        log::info!("Mixer: added source {} '{}'", index, source.label());
        self.events.publish(MixEvent::SourceAdded {
            index,
            label: source.label().to_string(),
        });
        self.sources.push(source);
        Ok(index)
    }

    fn ensure_idle(&self, operation: &str) -> MixResult<()> {
        if self.state != MixerState::Idle {
            return Err(MixError::InvalidState(format!(
                "cannot {} while {:?}",
                operation, self.state
            )));
        }
        Ok(())
    }

    /// Mix every source into `output`
    ///
    /// The output container is finalized and all sources are stopped whether
    /// the loop ends cleanly or with an error.
    pub fn mix(&mut self, output: impl AsRef<Path>) -> MixResult<MixSummary> {
        self.ensure_idle("mix")?;
        let output = output.as_ref().to_path_buf();
        self.state = MixerState::Mixing;

        let mut writer = match EncodeWriter::open(&output, &self.config) {
            Ok(writer) => writer,
            Err(e) => {
                self.stop();
                return Err(self.fail(output, e));
            }
        };

        log::info!(
            "Mixer: mixing {} sources into {:?} ({:?})",
            self.sources.len(),
            output,
            self.config.strategy
        );
        self.events.publish(MixEvent::MixStarted {
            output: output.clone(),
            sources: self.sources.len(),
        });

        let mut block = vec![0u8; writer.block_bytes()];
        let looped = match self.config.strategy {
            MixStrategy::Lead => self.mix_lead(&mut writer, &mut block),
            MixStrategy::Sum => self.mix_sum(&mut writer, &mut block),
        };
        let finished = writer.finish();

        self.stop();
        self.report_failed_sources();

        let result = looped.and_then(|blocks| {
            finished.map(|samples| MixSummary {
                blocks,
                samples,
                packets: writer.packets_written(),
            })
        });

        match result {
            Ok(summary) => {
                self.state = MixerState::Finished;
                log::info!("Mixer: finished {:?}: {:?}", output, summary);
                self.events.publish(MixEvent::MixFinished { output, summary });
                Ok(summary)
            }
            Err(e) => Err(self.fail(output, e)),
        }
    }

    fn fail(&mut self, output: PathBuf, error: MixError) -> MixError {
        self.state = MixerState::Failed;
        log::error!("Mixer: mix into {:?} failed: {}", output, error);
        self.events.publish(MixEvent::MixFailed {
            output,
            error: error.clone(),
        });
        error
    }

    /// Write blocks of the first source until it ends
    ///
    /// Every other active source is pulled by one block per round and the
    /// block is discarded, so all sources advance together. A follower that
    /// ends or fails just drops out; only the lead decides when the loop ends.
    fn mix_lead(&mut self, writer: &mut EncodeWriter, block: &mut [u8]) -> MixResult<u64> {
        let Some((lead, followers)) = self.sources.split_first_mut() else {
            return Ok(0);
        };

        let mut active = vec![true; followers.len()];
        let mut scratch = vec![0u8; block.len()];
        let mut blocks = 0;
        loop {
            let n = lead.fill(block)?;
            if n == 0 {
                return Ok(blocks);
            }

            for (source, active) in followers.iter_mut().zip(active.iter_mut()) {
                if !*active {
                    continue;
                }
                match source.fill(&mut scratch) {
                    Ok(0) => *active = false,
                    Ok(_) => {}
                    Err(e) => {
                        log::warn!("Mixer: dropping source '{}': {}", source.label(), e);
                        *active = false;
                    }
                }
            }

            writer.write_block(&block[..n])?;
            blocks += 1;
            log::debug!("Mixer: block {} ({} bytes)", blocks, n);
        }
    }

    /// Sum blocks of every source with 16-bit saturation until all end
    fn mix_sum(&mut self, writer: &mut EncodeWriter, block: &mut [u8]) -> MixResult<u64> {
        let mut active = vec![true; self.sources.len()];
        let mut scratch = vec![0u8; block.len()];
        let mut acc = vec![0i16; block.len() / BYTES_PER_SAMPLE];
        let mut blocks = 0;

        loop {
            acc.fill(0);
            let mut longest = 0;

            for (source, active) in self.sources.iter_mut().zip(active.iter_mut()) {
                if !*active {
                    continue;
                }
                let n = source.fill(&mut scratch)?;
                if n == 0 {
                    *active = false;
                    continue;
                }
                for (sum, bytes) in acc.iter_mut().zip(scratch[..n].chunks_exact(BYTES_PER_SAMPLE)) {
                    *sum = sum.saturating_add(i16::from_le_bytes([bytes[0], bytes[1]]));
                }
                longest = longest.max(n);
            }

            if longest == 0 {
                return Ok(blocks);
            }

            for (bytes, sample) in block[..longest]
                .chunks_exact_mut(BYTES_PER_SAMPLE)
                .zip(&acc)
            {
                bytes.copy_from_slice(&sample.to_le_bytes());
            }
            writer.write_block(&block[..longest])?;
            blocks += 1;
        }
    }

    fn report_failed_sources(&self) {
        for (index, source) in self.sources.iter().enumerate() {
            if let SourceStatus::Failed(error) = source.status() {
                self.events.publish(MixEvent::SourceFailed {
                    index,
                    label: source.label().to_string(),
                    error,
                });
            }
        }
    }

    /// Stop every source (idempotent)
    pub fn stop(&mut self) {
        for source in &mut self.sources {
            source.stop();
        }
    }
}

impl Drop for Mixer {
    fn drop(&mut self) {
        self.stop();
    }
}
