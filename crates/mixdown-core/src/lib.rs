//! Mixdown Core - concurrent decode pipeline for combining audio files
//!
//! Every input file gets its own reader thread and decode thread. Compressed
//! units flow through a bounded [`pipeline::PacketQueue`], decoded PCM flows
//! through a blocking [`pipeline::ring_buffer`], and the [`mixer::Mixer`] pulls
//! fixed-size blocks from each source and hands them to the
//! [`encode::EncodeWriter`].
//!
//! ```text
//! Reader ──► PacketQueue ──► DecodeWorker ──► RingBuffer ──► Mixer ──► EncodeWriter
//! ```
//!
//! # Example Usage
//!
//! ```ignore
//! use mixdown_core::{Mixer, MixerConfig};
//!
//! let mut mixer = Mixer::new(MixerConfig::default());
//! mixer.add("intro.mp3")?;
//! let summary = mixer.mix("out.wav")?;
//! log::info!("wrote {} samples", summary.samples);
//! ```

pub mod config;
pub mod encode;
pub mod error;
pub mod events;
pub mod media;
pub mod mixer;
pub mod pipeline;
pub mod resample;
pub mod source;
pub mod types;

pub use config::{MixStrategy, MixerConfig};
pub use error::{MixError, MixResult};
pub use events::{EventBus, MixEvent};
pub use mixer::{MixSummary, Mixer, MixerState};
pub use source::{Source, SourceStatus};
pub use types::*;
