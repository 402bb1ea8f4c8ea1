//! BPM estimation from onset peak times
//!
//! Histogram of inter-peak intervals, with every candidate folded into a
//! single tempo octave so half-time and double-time hits vote together.

/// Result of a BPM estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BpmEstimate {
    pub bpm: f32,
    /// Share of candidates that voted for `bpm` (0.0 - 1.0)
    pub confidence: f32,
}

impl BpmEstimate {
    /// Returned whenever there is not enough evidence to estimate
    pub const FALLBACK: Self = Self {
        bpm: 120.0,
        confidence: 0.0,
    };
}

/// Estimates tempo from peak times using interval voting
#[derive(Debug, Clone)]
pub struct BpmEstimator {
    /// Minimum number of peaks required
    min_peaks: usize,
    /// Minimum number of plausible intervals required
    min_intervals: usize,
    /// Shortest plausible interval in seconds (exclusive)
    min_interval_sec: f64,
    /// Longest plausible interval in seconds (exclusive)
    max_interval_sec: f64,
    /// Lower bound of the folding octave
    fold_min: f32,
    /// Upper bound of the folding octave
    fold_max: f32,
}

impl Default for BpmEstimator {
    fn default() -> Self {
        Self {
            min_peaks: 6,
            min_intervals: 4,
            min_interval_sec: 0.08,
            max_interval_sec: 1.2,
            fold_min: 80.0,
            fold_max: 180.0,
        }
    }
}

impl BpmEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Estimate BPM from ascending peak times in seconds
    pub fn estimate(&self, peak_times_sec: &[f64]) -> BpmEstimate {
        if peak_times_sec.len() < self.min_peaks {
            return BpmEstimate::FALLBACK;
        }

        let candidates: Vec<f32> = peak_times_sec
            .windows(2)
            .map(|w| w[1] - w[0])
            .filter(|&d| d > self.min_interval_sec && d < self.max_interval_sec)
            .map(|d| fold_to_range((60.0 / d) as f32, self.fold_min, self.fold_max))
            .collect();

        if candidates.len() < self.min_intervals {
            return BpmEstimate::FALLBACK;
        }

        // Bins kept in first-seen order so ties resolve to the earliest tempo
        let mut bins: Vec<(i32, u32)> = Vec::new();
        for &bpm in &candidates {
            let key = (bpm + 0.5).floor() as i32;
            match bins.iter_mut().find(|(k, _)| *k == key) {
                Some((_, count)) => *count += 1,
                None => bins.push((key, 1)),
            }
        }

        let mut best_bpm = 120;
        let mut best_count = 0;
        for &(bpm, count) in &bins {
            if count > best_count {
                best_count = count;
                best_bpm = bpm;
            }
        }

        let confidence = (best_count as f32 / candidates.len() as f32).clamp(0.0, 1.0);
        BpmEstimate {
            bpm: best_bpm as f32,
            confidence,
        }
    }
}

/// Fold a tempo into `[min, max]` by repeated doubling or halving
///
/// `max` must be at least twice `min` for every positive input to land in
/// range. Non-positive or non-finite values are returned unchanged.
pub fn fold_to_range(bpm: f32, min: f32, max: f32) -> f32 {
    if !bpm.is_finite() || bpm <= 0.0 {
        return bpm;
    }
    let mut b = bpm;
    while b < min {
        b *= 2.0;
    }
    while b > max {
        b /= 2.0;
    }
    b
}
