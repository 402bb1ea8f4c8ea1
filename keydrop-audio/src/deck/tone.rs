//! Per-deck tone section: bass shelf, mid peak, sweepable lowpass, fader

use std::f32::consts::PI;

/// Tone control addressed by the parameter API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToneTarget {
    Mid,
    Bass,
    Filter,
    Fader,
}

impl ToneTarget {
    pub const ALL: [ToneTarget; 4] = [
        ToneTarget::Mid,
        ToneTarget::Bass,
        ToneTarget::Filter,
        ToneTarget::Fader,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToneTarget::Mid => "mid",
            ToneTarget::Bass => "bass",
            ToneTarget::Filter => "filter",
            ToneTarget::Fader => "fader",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

/// Biquad response shape
#[derive(Debug, Clone, Copy, PartialEq)]
enum Shape {
    LowShelf { gain_db: f32 },
    Peaking { gain_db: f32, q: f32 },
    LowPass { q: f32 },
}

/// Stereo direct-form-I biquad, RBJ cookbook coefficients normalized by a0
#[derive(Debug, Clone)]
struct Biquad {
    shape: Shape,
    freq: f32,
    sample_rate: f32,

    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,

    /// x1, x2, y1, y2 per channel
    state: [[f32; 4]; 2],
}

impl Biquad {
    fn new(shape: Shape, freq: f32, sample_rate: f32) -> Self {
        let mut filter = Self {
            shape,
            freq,
            sample_rate,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            state: [[0.0; 4]; 2],
        };
        filter.calculate_coefficients();
        filter
    }

    fn set_shape(&mut self, shape: Shape) {
        if shape != self.shape {
            self.shape = shape;
            self.calculate_coefficients();
        }
    }

    fn set_freq(&mut self, freq: f32) {
        if freq != self.freq {
            self.freq = freq;
            self.calculate_coefficients();
        }
    }

    fn calculate_coefficients(&mut self) {
        let freq = self.freq.clamp(10.0, self.sample_rate * 0.45);
        let omega = 2.0 * PI * freq / self.sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();

        let (b0, b1, b2, a0, a1, a2) = match self.shape {
            Shape::LowShelf { gain_db } => {
                let a = 10f32.powf(gain_db / 40.0);
                // Shelf slope 1
                let alpha = sin_omega / 2.0 * 2f32.sqrt();
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_omega),
                    a * ((a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha),
                    (a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_omega),
                    (a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha,
                )
            }
            Shape::Peaking { gain_db, q } => {
                let a = 10f32.powf(gain_db / 40.0);
                let alpha = sin_omega / (2.0 * q);
                (
                    1.0 + alpha * a,
                    -2.0 * cos_omega,
                    1.0 - alpha * a,
                    1.0 + alpha / a,
                    -2.0 * cos_omega,
                    1.0 - alpha / a,
                )
            }
            Shape::LowPass { q } => {
                let alpha = sin_omega / (2.0 * q);
                (
                    (1.0 - cos_omega) / 2.0,
                    1.0 - cos_omega,
                    (1.0 - cos_omega) / 2.0,
                    1.0 + alpha,
                    -2.0 * cos_omega,
                    1.0 - alpha,
                )
            }
        };

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }

    #[inline]
    fn process_sample(&mut self, input: f32, channel: usize) -> f32 {
        let [x1, x2, y1, y2] = &mut self.state[channel];
        let output = self.b0 * input + self.b1 * *x1 + self.b2 * *x2 - self.a1 * *y1 - self.a2 * *y2;
        *x2 = *x1;
        *x1 = input;
        *y2 = *y1;
        *y1 = output;
        output
    }

    fn process(&mut self, samples: &mut [f32]) {
        for frame in samples.chunks_exact_mut(2) {
            frame[0] = self.process_sample(frame[0], 0);
            frame[1] = self.process_sample(frame[1], 1);
        }
    }

    fn reset(&mut self) {
        self.state = [[0.0; 4]; 2];
    }
}

/// Tone section of one deck
///
/// Values are kept in the normalized 0..1 form the controls use; mid and
/// bass map to +/-12 dB, the filter maps exponentially onto 80 Hz - 20 kHz.
pub struct ToneControls {
    bass: Biquad,
    mid: Biquad,
    lowpass: Biquad,

    bass_db: f32,
    mid_db: f32,
    /// Filter knob (0.0 - 1.0)
    filter: f32,
    /// Fader gain (0.0 - 1.0)
    fader: f32,
    /// Smoothed fader gain
    smoothed_fader: f32,
}

impl ToneControls {
    pub const EQ_RANGE_DB: f32 = 12.0;
    pub const DEFAULT_FADER: f32 = 0.9;

    const BASS_FREQ: f32 = 120.0;
    const MID_FREQ: f32 = 1000.0;
    const MID_Q: f32 = 1.0;
    const LOWPASS_Q: f32 = 0.7;
    const FILTER_MIN_HZ: f32 = 80.0;
    const FILTER_MAX_HZ: f32 = 20000.0;

    /// Smoothing coefficient for fader (~5ms at 48kHz)
    const FADER_SMOOTH_COEFF: f32 = 0.995;

    pub fn new(sample_rate: f32) -> Self {
        Self {
            bass: Biquad::new(Shape::LowShelf { gain_db: 0.0 }, Self::BASS_FREQ, sample_rate),
            mid: Biquad::new(
                Shape::Peaking {
                    gain_db: 0.0,
                    q: Self::MID_Q,
                },
                Self::MID_FREQ,
                sample_rate,
            ),
            lowpass: Biquad::new(
                Shape::LowPass { q: Self::LOWPASS_Q },
                Self::FILTER_MAX_HZ,
                sample_rate,
            ),
            bass_db: 0.0,
            mid_db: 0.0,
            filter: 1.0,
            fader: Self::DEFAULT_FADER,
            smoothed_fader: Self::DEFAULT_FADER,
        }
    }

    /// Lowpass cutoff for a filter knob value: `80 * (20000 / 80)^v`
    pub fn filter_cutoff_hz(value: f32) -> f32 {
        let v = value.clamp(0.0, 1.0);
        Self::FILTER_MIN_HZ * (Self::FILTER_MAX_HZ / Self::FILTER_MIN_HZ).powf(v)
    }

    pub fn set_fader(&mut self, value: f32) {
        if !value.is_finite() {
            return;
        }
        self.fader = value.clamp(0.0, 1.0);
    }

    pub fn fader(&self) -> f32 {
        self.fader
    }

    pub fn set_bass_gain_db(&mut self, db: f32) {
        if !db.is_finite() {
            return;
        }
        self.bass_db = db.clamp(-Self::EQ_RANGE_DB, Self::EQ_RANGE_DB);
        self.bass.set_shape(Shape::LowShelf {
            gain_db: self.bass_db,
        });
    }

    pub fn bass_gain_db(&self) -> f32 {
        self.bass_db
    }

    pub fn set_mid_gain_db(&mut self, db: f32) {
        if !db.is_finite() {
            return;
        }
        self.mid_db = db.clamp(-Self::EQ_RANGE_DB, Self::EQ_RANGE_DB);
        self.mid.set_shape(Shape::Peaking {
            gain_db: self.mid_db,
            q: Self::MID_Q,
        });
    }

    pub fn mid_gain_db(&self) -> f32 {
        self.mid_db
    }

    pub fn set_filter_value(&mut self, value: f32) {
        if !value.is_finite() {
            return;
        }
        self.filter = value.clamp(0.0, 1.0);
        self.lowpass.set_freq(Self::filter_cutoff_hz(self.filter));
    }

    pub fn filter_value(&self) -> f32 {
        self.filter
    }

    /// Current lowpass cutoff
    pub fn cutoff_hz(&self) -> f32 {
        self.lowpass.freq
    }

    /// Normalized (0.0 - 1.0) value of a control
    pub fn param(&self, target: ToneTarget) -> f32 {
        match target {
            ToneTarget::Mid => db_to_unit(self.mid_db),
            ToneTarget::Bass => db_to_unit(self.bass_db),
            ToneTarget::Filter => self.filter,
            ToneTarget::Fader => self.fader,
        }
    }

    /// Set a control from its normalized value (clamped to 0.0 - 1.0)
    pub fn set_param(&mut self, target: ToneTarget, value: f32) {
        if !value.is_finite() {
            return;
        }
        let v = value.clamp(0.0, 1.0);
        match target {
            ToneTarget::Mid => self.set_mid_gain_db(unit_to_db(v)),
            ToneTarget::Bass => self.set_bass_gain_db(unit_to_db(v)),
            ToneTarget::Filter => self.set_filter_value(v),
            ToneTarget::Fader => self.set_fader(v),
        }
    }

    /// Nudge a control by `delta` in normalized units
    pub fn adjust_param(&mut self, target: ToneTarget, delta: f32) {
        self.set_param(target, self.param(target) + delta);
    }

    /// Run the EQ and filter stages in place
    pub fn process_eq(&mut self, samples: &mut [f32]) {
        self.bass.process(samples);
        self.mid.process(samples);
        self.lowpass.process(samples);
    }

    /// Apply the fader with per-frame smoothing
    pub fn process_fader(&mut self, samples: &mut [f32]) {
        for frame in samples.chunks_exact_mut(2) {
            self.smoothed_fader = Self::FADER_SMOOTH_COEFF * self.smoothed_fader
                + (1.0 - Self::FADER_SMOOTH_COEFF) * self.fader;
            frame[0] *= self.smoothed_fader;
            frame[1] *= self.smoothed_fader;
        }
    }

    /// Clear filter memory (on track change)
    pub fn reset(&mut self) {
        self.bass.reset();
        self.mid.reset();
        self.lowpass.reset();
    }
}

fn unit_to_db(v: f32) -> f32 {
    (v * 2.0 - 1.0) * ToneControls::EQ_RANGE_DB
}

fn db_to_unit(db: f32) -> f32 {
    (db / ToneControls::EQ_RANGE_DB + 1.0) * 0.5
}
