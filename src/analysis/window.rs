use std::f32::consts::PI;

/// Hann taper coefficient for sample `index` of a block of `size` samples.
///
/// `size` must be at least 2; the taper is undefined for a single sample.
pub fn hann_coefficient(index: usize, size: usize) -> f32 {
    debug_assert!(size >= 2, "Hann window needs at least two samples");
    0.5 * (1.0 - (2.0 * PI * index as f32 / (size - 1) as f32).cos())
}

/// Precomputed coefficients for a whole block, reused across chunks.
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size).map(|i| hann_coefficient(i, size)).collect()
}

/// Tapers a block of 16-bit samples into `out` using precomputed coefficients.
pub fn apply(samples: &[i16], window: &[f32], out: &mut [f32]) {
    debug_assert_eq!(samples.len(), window.len());
    for ((o, &s), &w) in out.iter_mut().zip(samples).zip(window) {
        *o = s as f32 * w;
    }
}
