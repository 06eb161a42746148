use rustfft::num_complex::Complex;

use super::levels::{self, ScaleMode};
use super::smoothing::PeakDecay;
use super::transform::{self, SpectralTransform};
use super::window;
use super::AnalysisSettings;
use crate::error::PipelineError;

/// Window → transform → extract → smooth for one channel of fixed-size chunks.
///
/// All working buffers are allocated once in [`Analyzer::new`] and reused for
/// every chunk of the stream.
pub struct Analyzer {
    size: usize,
    scale: ScaleMode,
    window: Vec<f32>,
    transform: SpectralTransform,
    channel: Vec<i16>,
    tapered: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    scaled: Vec<f32>,
    smoother: PeakDecay,
}

impl Analyzer {
    pub fn new(settings: &AnalysisSettings) -> Result<Self, PipelineError> {
        settings.validate()?;
        let size = settings.chunk_frames;
        let bands = size / 2;
        Ok(Self {
            size,
            scale: settings.scale,
            window: window::hann_window(size),
            transform: SpectralTransform::new(size),
            channel: vec![0; size],
            tapered: vec![0.0; size],
            spectrum: vec![Complex::new(0.0, 0.0); size],
            magnitudes: vec![0.0; bands],
            scaled: vec![0.0; bands],
            smoother: PeakDecay::new(bands, settings.decay_step),
        })
    }

    /// Samples per analysis block.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn band_count(&self) -> usize {
        self.size / 2
    }

    /// Raw bin magnitudes of the most recent block, before scaling and smoothing.
    #[allow(dead_code)]
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Analyzes the first channel of an interleaved little-endian 16-bit chunk.
    ///
    /// The chunk must hold exactly `size()` frames of `frame_size` bytes.
    pub fn analyze_chunk(&mut self, bytes: &[u8], frame_size: usize) -> &[f32] {
        debug_assert_eq!(bytes.len(), self.size * frame_size);
        split_first_channel(bytes, frame_size, &mut self.channel);
        self.run()
    }

    /// Analyzes a block of mono samples of length `size()`.
    #[allow(dead_code)]
    pub fn analyze_samples(&mut self, samples: &[i16]) -> &[f32] {
        self.channel.copy_from_slice(samples);
        self.run()
    }

    fn run(&mut self) -> &[f32] {
        window::apply(&self.channel, &self.window, &mut self.tapered);
        transform::load_real(&mut self.spectrum, &self.tapered);
        self.transform.process(&mut self.spectrum);

        let half = self.size / 2;
        levels::extract(
            &self.spectrum[..half],
            self.scale,
            &mut self.magnitudes,
            &mut self.scaled,
        );
        self.smoother.apply(&self.scaled)
    }
}

/// De-interleaves the first channel of little-endian 16-bit frames into `out`.
pub fn split_first_channel(bytes: &[u8], frame_size: usize, out: &mut [i16]) {
    for (sample, frame) in out.iter_mut().zip(bytes.chunks_exact(frame_size)) {
        *sample = i16::from_le_bytes([frame[0], frame[1]]);
    }
}
