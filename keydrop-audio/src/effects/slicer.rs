//! Slicer effect - square-wave gate that chops the signal rhythmically

use super::{Effect, WetMix};

/// Gate driven by a square LFO swinging between fully open and closed
pub struct Slicer {
    sample_rate: f32,

    /// Gate rate in Hz (0.5 - 24)
    rate: f32,

    /// LFO phase (0.0 - 1.0)
    phase: f32,

    wet: WetMix,
}

impl Slicer {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            rate: 10.0,
            phase: 0.0,
            wet: WetMix::default(),
        }
    }

    /// Set gate rate in Hz (0.5 - 24)
    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate.clamp(0.5, 24.0);
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Gate gain for the current phase: 0.5 + 0.5 * square
    #[inline]
    fn gate(&self) -> f32 {
        let square = if self.phase < 0.5 { 1.0 } else { -1.0 };
        0.5 + 0.5 * square
    }
}

impl Effect for Slicer {
    fn process(&mut self, samples: &mut [f32]) {
        let inc = self.rate / self.sample_rate;

        if self.wet.is_silent() {
            // Keep the LFO running so re-enabling stays in rhythm
            let frames = samples.len() / 2;
            self.phase = (self.phase + inc * frames as f32).fract();
            return;
        }

        for frame in samples.chunks_mut(2) {
            let wet = self.wet.next();
            let gate = self.gate();
            for s in frame.iter_mut() {
                *s = *s * (1.0 - wet) + *s * gate * wet;
            }
            self.phase += inc;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
        }
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }

    fn mix(&self) -> f32 {
        self.wet.target()
    }

    fn set_mix(&mut self, mix: f32) {
        self.wet.set_target(mix);
    }

    fn name(&self) -> &'static str {
        "Slicer"
    }
}
