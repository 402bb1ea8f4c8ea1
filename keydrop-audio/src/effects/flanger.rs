//! Flanger effect - sweeping comb filter for jet-plane swoosh
//!
//! Mixes the signal with a copy delayed by a few milliseconds, where the
//! delay time wobbles on a slow sine LFO and the delay line feeds back
//! into itself.

use super::{Effect, WetMix};
use std::f32::consts::PI;

/// Flanger effect with LFO modulation
pub struct Flanger {
    sample_rate: f32,

    /// LFO rate in Hz (0.05 - 5.0)
    rate: f32,

    /// Modulation depth in seconds (0.001 - 0.012)
    depth_sec: f32,

    /// Feedback amount (0.0 - 0.95)
    feedback: f32,

    /// LFO phase (0.0 - 1.0)
    lfo_phase: f32,

    /// LFO phase increment per sample
    lfo_inc: f32,

    /// Delay buffer (stereo interleaved)
    delay_buffer: Vec<f32>,

    /// Delay line length in frames
    delay_frames: usize,

    /// Buffer write position
    write_pos: usize,

    /// Feedback state (stereo)
    feedback_l: f32,
    feedback_r: f32,

    wet: WetMix,
}

impl Flanger {
    /// Longest delay the line can hold
    const MAX_DELAY_SEC: f32 = 0.05;
    /// Delay around which the LFO sweeps
    const BASE_DELAY_SEC: f32 = 0.004;

    /// Create a new flanger effect
    pub fn new(sample_rate: f32) -> Self {
        let rate = 0.35;
        let delay_frames = (Self::MAX_DELAY_SEC * sample_rate).ceil() as usize + 2;

        Self {
            sample_rate,
            rate,
            depth_sec: 0.008,
            feedback: 0.75,
            lfo_phase: 0.0,
            lfo_inc: rate / sample_rate,
            delay_buffer: vec![0.0; delay_frames * 2],
            delay_frames,
            write_pos: 0,
            feedback_l: 0.0,
            feedback_r: 0.0,
            wet: WetMix::default(),
        }
    }

    /// Set LFO rate in Hz (0.05 - 5.0)
    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate.clamp(0.05, 5.0);
        self.lfo_inc = self.rate / self.sample_rate;
    }

    /// Get LFO rate
    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Set modulation depth in milliseconds (1 - 12)
    pub fn set_depth_ms(&mut self, depth_ms: f32) {
        self.depth_sec = depth_ms.clamp(1.0, 12.0) / 1000.0;
    }

    /// Get depth in milliseconds
    pub fn depth_ms(&self) -> f32 {
        self.depth_sec * 1000.0
    }

    /// Set feedback amount (0.0 - 0.95)
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.95);
    }

    /// Get feedback
    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    /// Read from delay buffer with linear interpolation
    #[inline]
    fn read_delay(&self, delay_samples: f32, is_right: bool) -> f32 {
        let channel_offset = if is_right { 1 } else { 0 };
        let len = self.delay_frames as f32;
        let delay = delay_samples.clamp(1.0, len - 2.0);

        let read_pos = (self.write_pos as f32 - delay).rem_euclid(len);
        let pos_int = (read_pos as usize) % self.delay_frames;
        let frac = read_pos.fract();

        let i0 = pos_int * 2 + channel_offset;
        let i1 = ((pos_int + 1) % self.delay_frames) * 2 + channel_offset;

        self.delay_buffer[i0] * (1.0 - frac) + self.delay_buffer[i1] * frac
    }

    /// Soft saturation for feedback path
    #[inline]
    fn soft_saturate(x: f32) -> f32 {
        let x2 = x * x;
        x * (27.0 + x2) / (27.0 + 9.0 * x2)
    }
}

impl Effect for Flanger {
    fn process(&mut self, samples: &mut [f32]) {
        // The delay line keeps running while dry so re-enabling only crossfades
        let dry = self.wet.is_silent();
        let base = Self::BASE_DELAY_SEC * self.sample_rate;
        let depth = self.depth_sec * self.sample_rate;

        for frame in samples.chunks_mut(2) {
            if frame.len() < 2 {
                continue;
            }

            let lfo = (self.lfo_phase * 2.0 * PI).sin();
            self.lfo_phase += self.lfo_inc;
            if self.lfo_phase >= 1.0 {
                self.lfo_phase -= 1.0;
            }

            let delay_samples = base + lfo * depth;

            let delayed_l = self.read_delay(delay_samples, false);
            let delayed_r = self.read_delay(delay_samples, true);

            let input_l = frame[0] + Self::soft_saturate(self.feedback_l * self.feedback);
            let input_r = frame[1] + Self::soft_saturate(self.feedback_r * self.feedback);

            let write_idx = self.write_pos * 2;
            self.delay_buffer[write_idx] = input_l;
            self.delay_buffer[write_idx + 1] = input_r;
            self.write_pos = (self.write_pos + 1) % self.delay_frames;

            self.feedback_l = delayed_l;
            self.feedback_r = delayed_r;

            if dry {
                continue;
            }
            let wet = self.wet.next();
            frame[0] = frame[0] * (1.0 - wet) + delayed_l * wet;
            frame[1] = frame[1] * (1.0 - wet) + delayed_r * wet;
        }
    }

    fn reset(&mut self) {
        self.delay_buffer.fill(0.0);
        self.write_pos = 0;
        self.lfo_phase = 0.0;
        self.feedback_l = 0.0;
        self.feedback_r = 0.0;
    }

    fn mix(&self) -> f32 {
        self.wet.target()
    }

    fn set_mix(&mut self, mix: f32) {
        self.wet.set_target(mix);
    }

    fn name(&self) -> &'static str {
        "Flanger"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flanger_defaults() {
        let flanger = Flanger::new(48000.0);
        assert_eq!(flanger.rate(), 0.35);
        assert_eq!(flanger.feedback(), 0.75);
        assert!((flanger.depth_ms() - 8.0).abs() < 1e-4);
        assert_eq!(flanger.mix(), 0.0);
    }

    #[test]
    fn test_flanger_parameter_clamping() {
        let mut flanger = Flanger::new(48000.0);

        flanger.set_rate(10.0);
        assert_eq!(flanger.rate(), 5.0);

        flanger.set_feedback(2.0);
        assert_eq!(flanger.feedback(), 0.95);

        flanger.set_feedback(-2.0);
        assert_eq!(flanger.feedback(), 0.0);

        flanger.set_depth_ms(40.0);
        assert!((flanger.depth_ms() - 12.0).abs() < 1e-4);
    }

    #[test]
    fn test_delay_line_holds_max_delay() {
        let flanger = Flanger::new(44100.0);
        assert!(flanger.delay_frames as f32 >= 0.05 * 44100.0);
    }

    #[test]
    fn test_flanger_wet_is_delayed() {
        let mut flanger = Flanger::new(48000.0);
        flanger.set_mix(1.0);
        flanger.wet.settle();

        // An impulse should not come out before the shortest delay
        let mut samples = vec![0.0f32; 2 * 2048];
        samples[0] = 1.0;
        samples[1] = 1.0;
        flanger.process(&mut samples);

        assert!(samples[0].abs() < 1e-3);
        let energy: f32 = samples.iter().map(|s| s.abs()).sum();
        assert!(energy > 0.1, "delayed impulse should appear");
        assert!(samples.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_delay_line_drains_while_dry() {
        let sr = 48000.0;
        let mut flanger = Flanger::new(sr);
        flanger.set_mix(1.0);
        flanger.wet.settle();
        let mut loud = vec![0.8f32; 2 * 4800];
        flanger.process(&mut loud);

        flanger.set_mix(0.0);
        flanger.wet.settle();
        let mut loud = vec![0.8f32; 2 * 48000];
        flanger.process(&mut loud);
        assert!(loud.iter().all(|s| *s == 0.8), "dry output must be untouched");
        let mut silence = vec![0.0f32; 2 * 48000];
        flanger.process(&mut silence);

        flanger.set_mix(1.0);
        flanger.wet.settle();
        let mut out = vec![0.0f32; 2 * 4800];
        flanger.process(&mut out);
        let peak = out.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak < 1e-3, "stale delay line replayed: peak {}", peak);
    }
}
