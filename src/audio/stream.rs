use std::fmt;
use std::time::Duration;

use crate::error::PipelineError;

/// One-time description of a decoded PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Bytes per frame: `channels × bits_per_sample / 8`.
    pub frame_size: usize,
}

impl StreamDescriptor {
    /// Interleaved signed 16-bit little-endian PCM.
    pub fn pcm16(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample: 16,
            frame_size: channels as usize * 2,
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.sample_rate == 0 {
            return Err(PipelineError::InvalidDescriptor("sample rate is zero".into()));
        }
        if self.channels == 0 {
            return Err(PipelineError::InvalidDescriptor("no channels".into()));
        }
        if self.bits_per_sample != 16 {
            return Err(PipelineError::InvalidDescriptor(format!(
                "{}-bit samples are not supported, expected 16-bit",
                self.bits_per_sample
            )));
        }
        let expected = self.channels as usize * (self.bits_per_sample as usize / 8);
        if self.frame_size != expected {
            return Err(PipelineError::InvalidDescriptor(format!(
                "frame size {} does not match {} channels of {} bits",
                self.frame_size, self.channels, self.bits_per_sample
            )));
        }
        Ok(())
    }

    /// Whole frames in `len` bytes, or `None` if `len` splits a frame.
    pub fn frames_in(&self, len: usize) -> Option<usize> {
        (len % self.frame_size == 0).then(|| len / self.frame_size)
    }

    /// Playback time of `len` bytes.
    pub fn duration_of(&self, len: usize) -> Duration {
        let frames = len / self.frame_size;
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }
}

impl fmt::Display for StreamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layout = match self.channels {
            1 => "mono".to_string(),
            2 => "stereo".to_string(),
            n => format!("{} channels", n),
        };
        write!(
            f,
            "PCM_SIGNED {} Hz, {} bit, {}, {} bytes/frame, little-endian",
            self.sample_rate, self.bits_per_sample, layout, self.frame_size
        )
    }
}
