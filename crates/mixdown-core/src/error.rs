//! Mixdown error types
//!
//! Construction-time failures (open, stream lookup, codec lookup) are returned
//! from [`Mixer::add`](crate::Mixer::add). Failures inside a source's threads
//! are recorded on the source and surface from its sample pulls once the
//! already decoded PCM has been drained.

use thiserror::Error;

/// Errors that can occur while decoding, mixing or encoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MixError {
    /// Input cannot be opened or parsed
    #[error("Failed to open '{path}': {reason}")]
    Open { path: String, reason: String },

    /// No audio stream in the input
    #[error("No audio stream found in '{0}'")]
    StreamNotFound(String),

    /// No decoder for the stream's codec
    #[error("Decoder not found: {0}")]
    CodecNotFound(String),

    /// Resource exhaustion (allocation, thread spawn)
    #[error("Allocation failed: {0}")]
    Alloc(String),

    /// Demuxer read failure other than end of input
    #[error("Read failed: {0}")]
    Read(String),

    /// Unrecoverable decode failure
    #[error("Decode failed: {0}")]
    Decode(String),

    /// Resampler could not be constructed for the input format
    #[error("Failed to initialize resampler: {0}")]
    ResampleInit(String),

    /// Resampler failed while converting
    #[error("Resample failed: {0}")]
    Resample(String),

    /// Input format changed after the resampler was built
    #[error("Unsupported mid-stream format change: {from} -> {to}")]
    UnsupportedFormatChange { from: String, to: String },

    /// Encoder lookup failed
    #[error("Encoder not found: {0}")]
    EncoderNotFound(String),

    /// No muxer for the requested output container
    #[error("Unsupported output container: {0}")]
    UnsupportedContainer(String),

    /// Encode failure
    #[error("Encode failed: {0}")]
    Encode(String),

    /// Container write failure
    #[error("Write failed: {0}")]
    Write(String),

    /// Operation called in the wrong lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl MixError {
    /// Create an open error for the given path
    pub fn open(path: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Self::Open {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for failures raised while constructing a source
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            MixError::Open { .. } | MixError::StreamNotFound(_) | MixError::CodecNotFound(_)
        )
    }
}

/// Result type for mixdown operations
pub type MixResult<T> = Result<T, MixError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_error_display() {
        let err = MixError::open("song.mp3", "No such file");
        assert_eq!(err.to_string(), "Failed to open 'song.mp3': No such file");
        assert!(err.is_construction_error());
    }

    #[test]
    fn test_format_change_display() {
        let err = MixError::UnsupportedFormatChange {
            from: "48000Hz/2ch/f32".into(),
            to: "44100Hz/2ch/f32".into(),
        };
        assert!(err.to_string().contains("48000Hz/2ch/f32 -> 44100Hz/2ch/f32"));
        assert!(!err.is_construction_error());
    }
}
