//! Crush effect - waveshaper quantization for lo-fi grit
//!
//! The wet path drives the signal into a stepped transfer curve and trims
//! it back down: pre-gain -> quantize curve -> post-gain.

use super::{Effect, WetMix};

/// Crush effect with a precomputed quantization curve
pub struct Crush {
    /// Number of quantization steps per polarity (4 - 128)
    steps: u32,

    /// Transfer curve sampled over [-1, 1]
    curve: Vec<f32>,

    wet: WetMix,
}

impl Crush {
    /// Points in the transfer curve
    const CURVE_LEN: usize = 44100;
    /// Drive into the curve
    const PRE_GAIN: f32 = 2.5;
    /// Output trim after the curve
    const POST_GAIN: f32 = 0.7;
    /// Overdrive applied to each quantized level
    const GRIT: f32 = 1.1;

    const DEFAULT_STEPS: u32 = 32;

    /// Create a new crush effect
    pub fn new() -> Self {
        Self {
            steps: Self::DEFAULT_STEPS,
            curve: build_curve(Self::DEFAULT_STEPS, Self::CURVE_LEN),
            wet: WetMix::default(),
        }
    }

    /// Set quantization steps (fractional values are floored, 4 - 128)
    pub fn set_steps(&mut self, steps: f32) {
        let steps = if steps.is_finite() { steps.floor() } else { Self::DEFAULT_STEPS as f32 };
        let steps = steps.clamp(4.0, 128.0) as u32;
        if steps != self.steps {
            self.steps = steps;
            self.curve = build_curve(steps, Self::CURVE_LEN);
        }
    }

    /// Get quantization steps
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Wet signal for one sample
    #[inline]
    fn shape(&self, x: f32) -> f32 {
        let driven = (x * Self::PRE_GAIN).clamp(-1.0, 1.0);
        let last = self.curve.len() - 1;
        let idx = ((driven + 1.0) * 0.5 * last as f32).round() as usize;
        self.curve[idx.min(last)] * Self::POST_GAIN
    }
}

impl Default for Crush {
    fn default() -> Self {
        Self::new()
    }
}

/// `y = round(x * steps) / steps * 1.1`, clamped to [-1, 1]
fn build_curve(steps: u32, len: usize) -> Vec<f32> {
    let steps = steps as f32;
    (0..len)
        .map(|i| {
            let x = i as f32 * 2.0 / (len - 1) as f32 - 1.0;
            ((x * steps).round() / steps * Crush::GRIT).clamp(-1.0, 1.0)
        })
        .collect()
}

impl Effect for Crush {
    fn process(&mut self, samples: &mut [f32]) {
        if self.wet.is_silent() {
            return;
        }

        for frame in samples.chunks_mut(2) {
            let wet = self.wet.next();
            for s in frame.iter_mut() {
                *s = *s * (1.0 - wet) + self.shape(*s) * wet;
            }
        }
    }

    fn reset(&mut self) {}

    fn mix(&self) -> f32 {
        self.wet.target()
    }

    fn set_mix(&mut self, mix: f32) {
        self.wet.set_target(mix);
    }

    fn name(&self) -> &'static str {
        "Crush"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crush_creation() {
        let crush = Crush::new();
        assert_eq!(crush.steps(), 32);
        assert_eq!(crush.mix(), 0.0);
        assert_eq!(crush.curve.len(), 44100);
    }

    #[test]
    fn test_steps_clamped_and_floored() {
        let mut crush = Crush::new();
        crush.set_steps(1.0);
        assert_eq!(crush.steps(), 4);
        crush.set_steps(500.0);
        assert_eq!(crush.steps(), 128);
        crush.set_steps(9.9);
        assert_eq!(crush.steps(), 9);
    }

    #[test]
    fn test_curve_is_quantized_and_bounded() {
        let curve = build_curve(4, 1001);
        assert!(curve.iter().all(|y| (-1.0..=1.0).contains(y)));
        assert_eq!(curve[0], -1.0);
        assert_eq!(curve[1000], 1.0);
        assert_eq!(curve[500], 0.0);
    }

    #[test]
    fn test_crush_coarsens_ramp() {
        let mut crush = Crush::new();
        crush.set_steps(4.0);
        crush.set_mix(1.0);
        crush.wet.settle();

        let mut samples: Vec<f32> = (0..2000).map(|i| i as f32 / 999.5 - 1.0).collect();
        crush.process(&mut samples);

        let mut levels: Vec<i64> = samples.iter().map(|s| (s * 1e5).round() as i64).collect();
        levels.sort_unstable();
        levels.dedup();
        assert!(levels.len() <= 9, "got {} levels", levels.len());
        assert!(levels.len() > 2);
    }

    #[test]
    fn test_dry_at_zero_mix() {
        let mut crush = Crush::new();
        let original = vec![0.3, -0.2, 0.11, 0.05];
        let mut samples = original.clone();
        crush.process(&mut samples);
        assert_eq!(samples, original);
    }
}
