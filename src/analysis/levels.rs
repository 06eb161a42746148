use rustfft::num_complex::Complex;

/// Lowest reported level. Samples stay on the raw 16-bit scale, so a
/// magnitude below 1.0 is below anything audible and maps here.
pub const LEVEL_FLOOR_DB: f32 = 0.0;

/// Gain the linear scale applies to a bin magnitude by default.
pub const DEFAULT_LINEAR_GAIN: f32 = 0.00005;

/// How bin magnitudes become band values. Exactly one mode is active per stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleMode {
    /// `20·log10(magnitude)`, clamped at [`LEVEL_FLOOR_DB`].
    Decibel,
    /// `magnitude × gain`.
    Linear { gain: f32 },
}

impl ScaleMode {
    pub fn apply(&self, magnitude: f32) -> f32 {
        match *self {
            ScaleMode::Decibel => level_db(magnitude),
            ScaleMode::Linear { gain } => magnitude * gain,
        }
    }
}

pub fn magnitude(bin: Complex<f32>) -> f32 {
    (bin.re * bin.re + bin.im * bin.im).sqrt()
}

/// Decibel level of a magnitude. Never NaN or infinite.
pub fn level_db(magnitude: f32) -> f32 {
    if magnitude > 0.0 && magnitude.is_finite() {
        (20.0 * magnitude.log10()).max(LEVEL_FLOOR_DB)
    } else {
        LEVEL_FLOOR_DB
    }
}

/// Converts the one-sided spectrum into magnitudes and scaled band values.
pub fn extract(bins: &[Complex<f32>], scale: ScaleMode, magnitudes: &mut [f32], scaled: &mut [f32]) {
    for ((bin, m), v) in bins.iter().zip(magnitudes.iter_mut()).zip(scaled.iter_mut()) {
        *m = magnitude(*bin);
        *v = scale.apply(*m);
    }
}
