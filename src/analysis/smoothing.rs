/// Per-chunk fall in band units when the level is not rising.
pub const DEFAULT_DECAY_STEP: f32 = 0.5;

/// Peak hold with linear decay.
///
/// A rising value is taken as-is. Otherwise the previous output falls by
/// `decay_step` toward zero and the new, lower value is ignored.
pub fn peak_decay(prev: f32, new: f32, decay_step: f32) -> f32 {
    if new > prev {
        new
    } else {
        (prev - decay_step).max(0.0)
    }
}

/// Smoothing state: one retained output per band.
pub struct PeakDecay {
    decay_step: f32,
    state: Vec<f32>,
}

impl PeakDecay {
    pub fn new(bands: usize, decay_step: f32) -> Self {
        Self {
            decay_step,
            state: vec![0.0; bands],
        }
    }

    pub fn apply(&mut self, fresh: &[f32]) -> &[f32] {
        debug_assert_eq!(fresh.len(), self.state.len());
        for (prev, &new) in self.state.iter_mut().zip(fresh) {
            *prev = peak_decay(*prev, new, self.decay_step);
        }
        &self.state
    }

    #[allow(dead_code)]
    pub fn values(&self) -> &[f32] {
        &self.state
    }
}
