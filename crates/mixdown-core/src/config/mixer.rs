//! Mixer settings

use serde::{Deserialize, Serialize};

use crate::pipeline::{RingMode, DEFAULT_QUEUE_CAPACITY, DEFAULT_RING_BUFFER_BYTES};

/// How source blocks are combined into the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixStrategy {
    /// Every active source is pulled each round, only the first one is
    /// written. The mix ends when the first source ends or fails.
    #[default]
    Lead,
    /// Blocks are summed with 16-bit saturation until every source ends
    Sum,
}

/// Configuration for a [`Mixer`](crate::Mixer) and its sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Compressed units buffered between reader and decoder
    pub packet_queue_capacity: usize,
    /// Decoded PCM buffered per source, in bytes
    pub ring_buffer_bytes: usize,
    pub ring_buffer_mode: RingMode,
    /// Output encoder name
    pub encoder: String,
    /// Samples per channel in each mix block
    pub frame_size: usize,
    pub strategy: MixStrategy,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            packet_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            ring_buffer_bytes: DEFAULT_RING_BUFFER_BYTES,
            ring_buffer_mode: RingMode::Blocking,
            encoder: "pcm_s16le".to_string(),
            frame_size: 1024,
            strategy: MixStrategy::Lead,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: MixerConfig = serde_yaml::from_str("strategy: sum\nframe_size: 512\n").unwrap();
        assert_eq!(config.strategy, MixStrategy::Sum);
        assert_eq!(config.frame_size, 512);
        assert_eq!(config.packet_queue_capacity, 10);
        assert_eq!(config.ring_buffer_bytes, 4096);
        assert_eq!(config.encoder, "pcm_s16le");
    }

    #[test]
    fn test_ring_mode_serializes_snake_case() {
        let yaml = serde_yaml::to_string(&MixerConfig {
            ring_buffer_mode: RingMode::NonBlocking,
            ..Default::default()
        })
        .unwrap();
        assert!(yaml.contains("ring_buffer_mode: non_blocking"));
        assert!(yaml.contains("strategy: lead"));
    }
}
