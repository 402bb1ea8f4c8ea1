//! Kick effect - sidechain-style pumping locked to a tempo
//!
//! On every beat the wet gain ducks to `1 - depth` over the attack time and
//! recovers to unity over the release time, like a compressor keyed from a
//! kick drum.

use super::{Effect, WetMix};
use crate::timer::{LinearRamp, PeriodicTimer};

/// Tempo-synced ducking effect
pub struct Kick {
    sample_rate: f32,

    /// Pump tempo (40 - 240 BPM)
    bpm: f32,

    /// Duck amount (0.0 - 0.95)
    depth: f32,

    /// Duck time in ms (1 - 80)
    attack_ms: f32,

    /// Recovery time in ms (20 - 800)
    release_ms: f32,

    /// Gain applied to the wet path
    pump: LinearRamp,

    /// Beat timer, present only while pumping
    timer: Option<PeriodicTimer>,

    wet: WetMix,
}

impl Kick {
    /// Recovery ramp when pumping stops
    const STOP_RAMP_SEC: f32 = 0.03;

    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            bpm: 120.0,
            depth: 0.9,
            attack_ms: 3.0,
            release_ms: 260.0,
            pump: LinearRamp::new(1.0),
            timer: None,
            wet: WetMix::default(),
        }
    }

    /// Set pump tempo; restarts the beat timer when already pumping
    pub fn set_bpm(&mut self, bpm: f32) {
        if !bpm.is_finite() {
            return;
        }
        self.bpm = bpm.clamp(40.0, 240.0);
        if self.timer.is_some() {
            self.stop_pumping();
            self.start_pumping();
        }
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn set_depth(&mut self, depth: f32) {
        self.depth = depth.clamp(0.0, 0.95);
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    pub fn set_attack_ms(&mut self, ms: f32) {
        self.attack_ms = ms.clamp(1.0, 80.0);
    }

    pub fn attack_ms(&self) -> f32 {
        self.attack_ms
    }

    pub fn set_release_ms(&mut self, ms: f32) {
        self.release_ms = ms.clamp(20.0, 800.0);
    }

    pub fn release_ms(&self) -> f32 {
        self.release_ms
    }

    /// Whether the beat timer is running
    pub fn is_pumping(&self) -> bool {
        self.timer.is_some()
    }

    /// Current pump gain
    pub fn pump_gain(&self) -> f32 {
        self.pump.value()
    }

    fn frames(&self, seconds: f32) -> u64 {
        ((seconds * self.sample_rate).round() as u64).max(1)
    }

    fn beat_frames(&self) -> u64 {
        self.frames(60.0 / self.bpm)
    }

    fn start_pumping(&mut self) {
        if self.timer.is_some() {
            return;
        }
        // First tick ducks straight away
        self.timer = Some(PeriodicTimer::immediate(self.beat_frames()));
    }

    fn stop_pumping(&mut self) {
        self.timer = None;
        self.pump.cancel_and_hold();
        let frames = self.frames(Self::STOP_RAMP_SEC);
        self.pump.linear_ramp_to(1.0, frames);
    }

    fn pump_once(&mut self) {
        let attack = self.frames(self.attack_ms / 1000.0);
        let release = self.frames(self.release_ms / 1000.0);
        self.pump.cancel_and_hold();
        self.pump.linear_ramp_to(1.0 - self.depth, attack);
        self.pump.linear_ramp_to(1.0, release);
    }
}

impl Effect for Kick {
    fn process(&mut self, samples: &mut [f32]) {
        if self.wet.is_silent() && self.timer.is_none() {
            self.pump.advance((samples.len() / 2) as u64);
            return;
        }

        for frame in samples.chunks_mut(2) {
            let fire = self.timer.as_mut().is_some_and(|t| t.tick());
            if fire {
                self.pump_once();
            }
            let gain = self.pump.next();
            let wet = self.wet.next();
            for s in frame.iter_mut() {
                *s = *s * (1.0 - wet) + *s * gain * wet;
            }
        }
    }

    fn reset(&mut self) {
        self.pump.set(1.0);
        if let Some(timer) = self.timer.as_mut() {
            *timer = PeriodicTimer::immediate(timer.period());
        }
    }

    fn mix(&self) -> f32 {
        self.wet.target()
    }

    fn set_mix(&mut self, mix: f32) {
        if !mix.is_finite() {
            return;
        }
        self.wet.set_target(mix);
        if self.wet.target() == 0.0 {
            if self.timer.is_some() {
                self.stop_pumping();
            }
        } else {
            self.start_pumping();
        }
    }

    fn name(&self) -> &'static str {
        "Kick"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(kick: &mut Kick, frames: usize) -> Vec<f32> {
        let mut samples = vec![1.0f32; frames * 2];
        kick.process(&mut samples);
        samples
    }

    #[test]
    fn test_non_finite_bpm_ignored() {
        let mut kick = Kick::new(48000.0);
        kick.set_bpm(128.0);
        kick.set_bpm(f32::NAN);
        assert_eq!(kick.bpm(), 128.0);
        kick.set_mix(f32::NAN);
        assert_eq!(kick.mix(), 0.0);
        assert!(!kick.is_pumping());
    }

    #[test]
    fn test_parameter_clamping() {
        let mut kick = Kick::new(48000.0);
        kick.set_bpm(500.0);
        assert_eq!(kick.bpm(), 240.0);
        kick.set_depth(1.0);
        assert_eq!(kick.depth(), 0.95);
        kick.set_attack_ms(0.0);
        assert_eq!(kick.attack_ms(), 1.0);
        kick.set_release_ms(5000.0);
        assert_eq!(kick.release_ms(), 800.0);
    }

    #[test]
    fn test_mix_starts_and_stops_pumping() {
        let mut kick = Kick::new(48000.0);
        assert!(!kick.is_pumping());
        kick.set_mix(1.0);
        assert!(kick.is_pumping());
        kick.set_mix(0.0);
        assert!(!kick.is_pumping());
    }

    #[test]
    fn test_pump_ducks_immediately() {
        let mut kick = Kick::new(1000.0);
        kick.set_mix(1.0);
        kick.wet.settle();

        // 3 ms attack at 1 kHz
        let out = render(&mut kick, 10);
        assert!((out[2 * 2] - 0.1).abs() < 1e-3, "got {}", out[4]);
        assert!(out[2 * 9] > 0.1);
    }

    #[test]
    fn test_pump_repeats_each_beat() {
        let mut kick = Kick::new(1000.0);
        kick.set_mix(1.0);
        kick.wet.settle();

        // 120 BPM = 500 frames per beat, full recovery after 263 frames
        let out = render(&mut kick, 600);
        assert!((out[2 * 400] - 1.0).abs() < 1e-3);
        assert!((out[2 * 502] - 0.1).abs() < 1e-3);
    }

    #[test]
    fn test_stop_ramps_back_to_unity() {
        let mut kick = Kick::new(1000.0);
        kick.set_mix(1.0);
        kick.wet.settle();
        render(&mut kick, 3);
        assert!(kick.pump_gain() < 0.2);

        kick.set_mix(0.0);
        render(&mut kick, 100);
        assert_eq!(kick.pump_gain(), 1.0);
    }

    #[test]
    fn test_bpm_change_restarts_timer() {
        let mut kick = Kick::new(1000.0);
        kick.set_mix(1.0);
        kick.set_bpm(60.0);
        assert!(kick.is_pumping());
        assert_eq!(kick.timer.as_ref().map(|t| t.period()), Some(1000));
    }
}
