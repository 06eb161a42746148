use std::fmt;

use thiserror::Error;

use crate::pipeline::controller::PipelineState;

/// Errors raised by the decode → analysis → playback pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Audio stream unavailable: {0}")]
    StreamUnavailable(String),
    #[error("Audio sink unavailable: {0}")]
    SinkUnavailable(String),
    #[error("Decode fault: {0}")]
    DecodeFault(String),
    #[error("Playback fault: {0}")]
    Playback(String),
    #[error("Invalid stream descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("Invalid analysis size {0}: expected an even number of at least 2 frames")]
    InvalidAnalysisSize(usize),
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),
    #[error("Pipeline is {actual:?}, operation requires {expected:?}")]
    InvalidState {
        actual: PipelineState,
        expected: PipelineState,
    },
    #[error("Analysis worker failed: {0}")]
    Worker(String),
}

/// Why a chunk was forwarded to playback without being analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Zero-length chunk; nothing is analyzed or played.
    Empty,
    /// Length is not a whole number of frames.
    PartialFrame { len: usize, frame_size: usize },
    /// Whole frames, but not the analysis size (typically the tail of a stream).
    FrameCount { frames: usize, expected: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Empty => write!(f, "empty chunk"),
            SkipReason::PartialFrame { len, frame_size } => {
                write!(f, "{} bytes is not a whole number of {}-byte frames", len, frame_size)
            }
            SkipReason::FrameCount { frames, expected } => {
                write!(f, "{} frames, analysis needs {}", frames, expected)
            }
        }
    }
}
