//! Beat grid - periodic beat positions derived from tempo and anchor

/// A beat grid for a track
///
/// Pure function of `(bpm, anchor_sec)`; rebuild it whenever either changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatGrid {
    /// Tempo of the grid
    pub bpm: f32,
    /// Time of a reference beat in seconds
    pub anchor_sec: f64,
    /// Seconds per beat (cached)
    beat_interval_sec: f64,
}

impl BeatGrid {
    /// Create a new beat grid
    pub fn new(bpm: f32, anchor_sec: f64) -> Self {
        let beat_interval_sec = if bpm > 0.0 { 60.0 / bpm as f64 } else { 0.0 };
        Self {
            bpm,
            anchor_sec,
            beat_interval_sec,
        }
    }

    /// Seconds per beat
    pub fn beat_interval_sec(&self) -> f64 {
        self.beat_interval_sec
    }

    /// Fractional beat number at time `t` (negative before the anchor)
    pub fn beat_at(&self, t: f64) -> f64 {
        if self.beat_interval_sec <= 0.0 {
            return 0.0;
        }
        (t - self.anchor_sec) / self.beat_interval_sec
    }

    /// Phase within the current beat (0.0 - 1.0)
    pub fn phase_at(&self, t: f64) -> f32 {
        let beat = self.beat_at(t);
        (beat - beat.floor()) as f32
    }

    /// Grid beat closest to `t`
    pub fn nearest_beat(&self, t: f64) -> f64 {
        if self.beat_interval_sec <= 0.0 {
            return t;
        }
        // Halves round toward +inf
        let k = (self.beat_at(t) + 0.5).floor();
        self.anchor_sec + k * self.beat_interval_sec
    }

    /// First grid beat strictly after `t`
    pub fn next_beat(&self, t: f64) -> f64 {
        if self.beat_interval_sec <= 0.0 {
            return t;
        }
        let k = self.beat_at(t).floor() + 1.0;
        let next = self.anchor_sec + k * self.beat_interval_sec;
        // Guard against rounding right at a beat boundary
        if next <= t {
            next + self.beat_interval_sec
        } else {
            next
        }
    }
}
