//! Mixer implementation - crossfader and channel routing

use std::f32::consts::FRAC_PI_2;
use std::str::FromStr;

/// Crossfader curve type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrossfaderCurve {
    /// Linear crossfade
    Linear,
    /// Equal power: cos/sin of the fader angle
    #[default]
    ConstantPower,
    /// Sharp cut (DJ battle style)
    Cut,
}

impl CrossfaderCurve {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrossfaderCurve::Linear => "linear",
            CrossfaderCurve::ConstantPower => "constant_power",
            CrossfaderCurve::Cut => "cut",
        }
    }
}

impl FromStr for CrossfaderCurve {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "linear" => Ok(CrossfaderCurve::Linear),
            "constant_power" => Ok(CrossfaderCurve::ConstantPower),
            "cut" => Ok(CrossfaderCurve::Cut),
            other => Err(format!("unknown crossfader curve: {}", other)),
        }
    }
}

/// Mixer for combining deck outputs
pub struct Mixer {
    /// Crossfader position (-1.0 = deck 1 only, 0.0 = center, 1.0 = deck 2 only)
    crossfader: f32,
    /// Smoothed crossfader position (interpolates toward crossfader)
    smoothed_crossfader: f32,
    /// Crossfader curve
    curve: CrossfaderCurve,
}

impl Mixer {
    /// Smoothing coefficient for crossfader (~5ms at 48kHz)
    const CROSSFADER_SMOOTH_COEFF: f32 = 0.995;
}

impl Default for Mixer {
    fn default() -> Self {
        Self {
            crossfader: 0.0,
            smoothed_crossfader: 0.0,
            curve: CrossfaderCurve::ConstantPower,
        }
    }
}

impl Mixer {
    /// Create a new mixer
    pub fn new() -> Self {
        Self::default()
    }

    /// Set crossfader position (-1.0 to 1.0)
    pub fn set_crossfader(&mut self, position: f32) {
        if !position.is_finite() {
            return;
        }
        self.crossfader = position.clamp(-1.0, 1.0);
    }

    /// Move crossfader by delta
    pub fn adjust_crossfader(&mut self, delta: f32) {
        self.set_crossfader(self.crossfader + delta);
    }

    /// Get crossfader position
    pub fn crossfader(&self) -> f32 {
        self.crossfader
    }

    /// Set crossfader curve
    pub fn set_curve(&mut self, curve: CrossfaderCurve) {
        self.curve = curve;
    }

    pub fn curve(&self) -> CrossfaderCurve {
        self.curve
    }

    /// Gains for deck 1 and deck 2 at the target crossfader position
    pub fn gains(&self) -> (f32, f32) {
        self.gains_for(self.crossfader)
    }

    fn gains_for(&self, cf: f32) -> (f32, f32) {
        match self.curve {
            CrossfaderCurve::Linear => ((1.0 - cf) * 0.5, (1.0 + cf) * 0.5),
            CrossfaderCurve::ConstantPower => {
                let t = (cf + 1.0) * 0.5;
                let angle = t * FRAC_PI_2;
                (angle.cos().max(0.0), angle.sin().max(0.0))
            }
            CrossfaderCurve::Cut => {
                let a = if cf < 0.9 { 1.0 } else { (1.0 - cf) * 10.0 };
                let b = if cf > -0.9 { 1.0 } else { (1.0 + cf) * 10.0 };
                (a, b)
            }
        }
    }

    /// Mix two stereo buffers according to crossfader position
    /// Both inputs and output are interleaved stereo
    /// Uses per-frame smoothing to prevent clicks during crossfader moves
    pub fn mix(&mut self, deck_a: &[f32], deck_b: &[f32], output: &mut [f32]) {
        let len = output.len().min(deck_a.len()).min(deck_b.len());

        for i in (0..len).step_by(2) {
            self.smoothed_crossfader = Self::CROSSFADER_SMOOTH_COEFF * self.smoothed_crossfader
                + (1.0 - Self::CROSSFADER_SMOOTH_COEFF) * self.crossfader;

            let (gain_a, gain_b) = self.gains_for(self.smoothed_crossfader);

            output[i] = deck_a[i] * gain_a + deck_b[i] * gain_b;
            if i + 1 < len {
                output[i + 1] = deck_a[i + 1] * gain_a + deck_b[i + 1] * gain_b;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_power_law() {
        let mut mixer = Mixer::new();

        mixer.set_crossfader(-1.0);
        let (a, b) = mixer.gains();
        assert!((a - 1.0).abs() < 1e-6 && b.abs() < 1e-6);

        mixer.set_crossfader(0.0);
        let (a, b) = mixer.gains();
        let half = std::f32::consts::FRAC_1_SQRT_2;
        assert!((a - half).abs() < 1e-6 && (b - half).abs() < 1e-6);

        mixer.set_crossfader(1.0);
        let (a, b) = mixer.gains();
        assert!(a.abs() < 1e-6 && (b - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_equal_power_sums_to_unity_power() {
        let mut mixer = Mixer::new();
        for i in 0..=20 {
            mixer.set_crossfader(-1.0 + i as f32 * 0.1);
            let (a, b) = mixer.gains();
            assert!((a * a + b * b - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_crossfader_clamps() {
        let mut mixer = Mixer::new();
        mixer.set_crossfader(3.0);
        assert_eq!(mixer.crossfader(), 1.0);
        mixer.adjust_crossfader(-5.0);
        assert_eq!(mixer.crossfader(), -1.0);
    }

    #[test]
    fn test_mix_converges_to_target() {
        let mut mixer = Mixer::new();
        mixer.set_crossfader(-1.0);
        let a = vec![1.0f32; 2 * 4800];
        let b = vec![0.5f32; 2 * 4800];
        let mut out = vec![0.0f32; 2 * 4800];
        mixer.mix(&a, &b, &mut out);
        assert!((out[out.len() - 1] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_non_finite_crossfader_ignored() {
        let mut mixer = Mixer::new();
        mixer.set_crossfader(-1.0);
        mixer.set_crossfader(f32::NAN);
        mixer.adjust_crossfader(f32::INFINITY);
        assert_eq!(mixer.crossfader(), -1.0);

        let a = vec![1.0f32; 2 * 4800];
        let b = vec![0.5f32; 2 * 4800];
        let mut out = vec![0.0f32; 2 * 4800];
        mixer.mix(&a, &b, &mut out);
        assert!((out[out.len() - 1] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_curve_names() {
        for curve in [
            CrossfaderCurve::Linear,
            CrossfaderCurve::ConstantPower,
            CrossfaderCurve::Cut,
        ] {
            assert_eq!(curve.as_str().parse::<CrossfaderCurve>(), Ok(curve));
        }
        assert!("steep".parse::<CrossfaderCurve>().is_err());
    }
}
