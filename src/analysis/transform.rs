use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Forward complex FFT of a fixed size, planned once per stream.
///
/// The caller fills the real parts with windowed samples and zeroes the
/// imaginary parts before calling [`SpectralTransform::process`]; the
/// transform runs in place. Bins `0..=size/2` are the one-sided spectrum,
/// with DC at index 0 and Nyquist at index `size/2`. The upper half mirrors
/// the lower half and is ignored by the extractor.
pub struct SpectralTransform {
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    size: usize,
}

impl SpectralTransform {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self { fft, scratch, size }
    }

    pub fn process(&mut self, buffer: &mut [Complex<f32>]) {
        debug_assert_eq!(buffer.len(), self.size);
        self.fft.process_with_scratch(buffer, &mut self.scratch);
    }
}

/// Loads real samples into the complex working buffer, zeroing the imaginary half.
pub fn load_real(buffer: &mut [Complex<f32>], samples: &[f32]) {
    for (slot, &s) in buffer.iter_mut().zip(samples) {
        *slot = Complex::new(s, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_transform_to_zeros() {
        let mut transform = SpectralTransform::new(64);
        let mut buffer = vec![Complex::new(0.0f32, 0.0); 64];
        transform.process(&mut buffer);
        assert!(buffer.iter().all(|c| c.re == 0.0 && c.im == 0.0));
    }

    #[test]
    fn impulse_has_flat_spectrum() {
        let mut transform = SpectralTransform::new(32);
        let mut buffer = vec![Complex::new(0.0f32, 0.0); 32];
        buffer[0] = Complex::new(1.0, 0.0);
        transform.process(&mut buffer);
        for bin in &buffer {
            assert!((bin.norm() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn load_real_clears_stale_imaginary_parts() {
        let mut buffer = vec![Complex::new(7.0f32, 3.0); 4];
        load_real(&mut buffer, &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(buffer[2], Complex::new(3.0, 0.0));
        assert!(buffer.iter().all(|c| c.im == 0.0));
    }

    #[test]
    fn dc_lands_in_bin_zero() {
        let mut transform = SpectralTransform::new(16);
        let mut buffer = vec![Complex::new(0.0f32, 0.0); 16];
        load_real(&mut buffer, &[2.0; 16]);
        transform.process(&mut buffer);
        assert!((buffer[0].re - 32.0).abs() < 1e-4);
        assert!(buffer[1..].iter().all(|c| c.norm() < 1e-4));
    }
}
