//! Per-deck insert effects
//!
//! Every effect is always in the signal path; its mix only crossfades
//! between the dry and wet signal, so switching effects never clicks.

mod crush;
mod flanger;
mod kick;
mod rack;
mod slicer;

pub use crush::Crush;
pub use flanger::Flanger;
pub use kick::Kick;
pub use rack::EffectsRack;
pub use slicer::Slicer;

use std::fmt;

/// Trait for audio effects
pub trait Effect: Send {
    /// Process audio samples in place (stereo interleaved)
    fn process(&mut self, samples: &mut [f32]);

    /// Reset effect state
    fn reset(&mut self);

    /// Target dry/wet mix (0.0 - 1.0)
    fn mix(&self) -> f32;

    /// Set dry/wet mix (0.0 - 1.0)
    fn set_mix(&mut self, mix: f32);

    /// Get effect name
    fn name(&self) -> &'static str;
}

/// The effect types available in every rack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FxKind {
    Crush,
    Flanger,
    Slicer,
    Kick,
}

impl FxKind {
    /// All kinds in chain order
    pub const ALL: [FxKind; 4] = [FxKind::Crush, FxKind::Flanger, FxKind::Slicer, FxKind::Kick];

    pub fn as_str(&self) -> &'static str {
        match self {
            FxKind::Crush => "crush",
            FxKind::Flanger => "flanger",
            FxKind::Slicer => "slicer",
            FxKind::Kick => "kick",
        }
    }

    /// Parse a lowercase effect name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for FxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One-pole smoothed dry/wet amount
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WetMix {
    target: f32,
    current: f32,
}

impl WetMix {
    /// Wet envelope smoothing coefficient (~40ms at 48kHz)
    const SMOOTH_COEFF: f32 = 0.9995;

    pub(crate) fn target(&self) -> f32 {
        self.target
    }

    pub(crate) fn set_target(&mut self, mix: f32) {
        if !mix.is_finite() {
            return;
        }
        self.target = mix.clamp(0.0, 1.0);
    }

    /// Fully dry and settled, so processing can be skipped
    #[inline]
    pub(crate) fn is_silent(&self) -> bool {
        self.target == 0.0 && self.current < 0.0001
    }

    /// Advance one frame and return the wet amount
    #[inline]
    pub(crate) fn next(&mut self) -> f32 {
        self.current =
            Self::SMOOTH_COEFF * self.current + (1.0 - Self::SMOOTH_COEFF) * self.target;
        self.current
    }

    /// Jump straight to the target
    #[cfg(test)]
    pub(crate) fn settle(&mut self) {
        self.current = self.target;
    }
}
