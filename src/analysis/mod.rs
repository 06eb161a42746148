pub mod analyzer;
pub mod bands;
pub mod levels;
pub mod smoothing;
pub mod transform;
pub mod window;

use crate::error::PipelineError;
use levels::ScaleMode;

/// Frames per analysis block when nothing else is configured.
pub const DEFAULT_CHUNK_FRAMES: usize = 4096;

/// Fixed per-stream analysis parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisSettings {
    /// Frames per chunk; the FFT size. Yields `chunk_frames / 2` bands.
    pub chunk_frames: usize,
    pub scale: ScaleMode,
    pub decay_step: f32,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            chunk_frames: DEFAULT_CHUNK_FRAMES,
            scale: ScaleMode::Decibel,
            decay_step: smoothing::DEFAULT_DECAY_STEP,
        }
    }
}

impl AnalysisSettings {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.chunk_frames < 2 || self.chunk_frames % 2 != 0 {
            return Err(PipelineError::InvalidAnalysisSize(self.chunk_frames));
        }
        if !self.decay_step.is_finite() || self.decay_step < 0.0 {
            return Err(PipelineError::InvalidSetting(format!(
                "decay step must be a non-negative number, got {}",
                self.decay_step
            )));
        }
        if let ScaleMode::Linear { gain } = self.scale {
            if !gain.is_finite() || gain <= 0.0 {
                return Err(PipelineError::InvalidSetting(format!(
                    "linear gain must be positive, got {}",
                    gain
                )));
            }
        }
        Ok(())
    }

    /// How far a falling band drops per second of audio at `sample_rate`.
    ///
    /// The decay step applies once per analyzed chunk, so the fall rate
    /// scales with `sample_rate / chunk_frames`.
    pub fn decay_per_second(&self, sample_rate: u32) -> f32 {
        self.decay_step * sample_rate as f32 / self.chunk_frames as f32
    }
}
