//! Effects rack - the per-deck insert chain crush -> flanger -> slicer -> kick

use super::{Crush, Effect, FxKind, Flanger, Kick, Slicer};
use tracing::debug;

/// One deck's insert chain
///
/// Mixes are independent, so more than one effect can be wet at once.
/// `apply_fx` is the exclusive selector used by the console: it puts one
/// effect fully wet and silences the rest.
pub struct EffectsRack {
    crush: Crush,
    flanger: Flanger,
    slicer: Slicer,
    kick: Kick,
    /// Last effect chosen through `apply_fx`
    selected: Option<FxKind>,
}

impl EffectsRack {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            crush: Crush::new(),
            flanger: Flanger::new(sample_rate),
            slicer: Slicer::new(sample_rate),
            kick: Kick::new(sample_rate),
            selected: None,
        }
    }

    fn effect(&self, kind: FxKind) -> &dyn Effect {
        match kind {
            FxKind::Crush => &self.crush,
            FxKind::Flanger => &self.flanger,
            FxKind::Slicer => &self.slicer,
            FxKind::Kick => &self.kick,
        }
    }

    fn effect_mut(&mut self, kind: FxKind) -> &mut dyn Effect {
        match kind {
            FxKind::Crush => &mut self.crush,
            FxKind::Flanger => &mut self.flanger,
            FxKind::Slicer => &mut self.slicer,
            FxKind::Kick => &mut self.kick,
        }
    }

    /// Run the chain in place (stereo interleaved)
    pub fn process(&mut self, samples: &mut [f32]) {
        for kind in FxKind::ALL {
            self.effect_mut(kind).process(samples);
        }
    }

    /// Set one effect's mix without touching the others
    pub fn set_mix(&mut self, kind: FxKind, mix: f32) {
        if !mix.is_finite() {
            return;
        }
        self.effect_mut(kind).set_mix(mix);
        match self.selected {
            Some(s) if s == kind && mix <= 0.0 => self.selected = None,
            Some(s) if s != kind && mix > 0.0 => self.selected = None,
            _ => {}
        }
    }

    pub fn mix(&self, kind: FxKind) -> f32 {
        self.effect(kind).mix()
    }

    /// Make `fx` the only wet effect, or dry everything with `None`
    pub fn apply_fx(&mut self, fx: Option<FxKind>) {
        for kind in FxKind::ALL {
            let mix = if Some(kind) == fx { 1.0 } else { 0.0 };
            self.effect_mut(kind).set_mix(mix);
        }
        self.selected = fx;
        debug!(fx = ?fx, "effect selected");
    }

    /// Effect selected through `apply_fx`, if still the only wet one
    pub fn active_fx(&self) -> Option<FxKind> {
        self.selected
    }

    pub fn set_kick_bpm(&mut self, bpm: f32) {
        self.kick.set_bpm(bpm);
    }

    pub fn crush_mut(&mut self) -> &mut Crush {
        &mut self.crush
    }

    pub fn flanger_mut(&mut self) -> &mut Flanger {
        &mut self.flanger
    }

    pub fn slicer_mut(&mut self) -> &mut Slicer {
        &mut self.slicer
    }

    pub fn kick(&self) -> &Kick {
        &self.kick
    }

    pub fn kick_mut(&mut self) -> &mut Kick {
        &mut self.kick
    }

    pub fn reset(&mut self) {
        for kind in FxKind::ALL {
            self.effect_mut(kind).reset();
        }
    }
}
