//! Beat analysis of a decoded track
//!
//! Deliberately simple time-domain heuristic:
//! 1. Downmix to mono
//! 2. Rectified amplitude envelope at ~200 Hz
//! 3. Short moving-average smoothing
//! 4. Local peaks above the 85th percentile, spaced at least ~30 ms apart
//! 5. BPM from inter-peak intervals, anchored at the first peak

use crate::beatgrid::BeatGrid;
use crate::bpm::BpmEstimator;
use crate::buffer::PcmBuffer;
use tracing::debug;

/// Result of analyzing one buffer
#[derive(Debug, Clone, PartialEq)]
pub struct BeatAnalysis {
    /// Estimated tempo
    pub bpm: f32,
    /// Estimate reliability (0.0 - 1.0)
    pub confidence: f32,
    /// Detected onset peak times in seconds
    pub peak_times_sec: Vec<f64>,
    /// Grid reference point in seconds (first detected peak)
    pub anchor_sec: f64,
}

impl BeatAnalysis {
    /// Beat grid for this analysis
    pub fn grid(&self) -> BeatGrid {
        BeatGrid::new(self.bpm, self.anchor_sec)
    }
}

/// Envelope peak-picking beat analyzer
#[derive(Debug, Clone)]
pub struct BeatAnalyzer {
    /// Target envelope rate in Hz
    envelope_rate: f32,
    /// Moving-average window in envelope samples
    smoothing_window: usize,
    /// Percentile (0.0 - 1.0) a peak must reach
    threshold_percentile: f32,
    /// Minimum spacing between accepted peaks in seconds
    min_peak_distance_sec: f32,
    estimator: BpmEstimator,
}

impl Default for BeatAnalyzer {
    fn default() -> Self {
        Self {
            envelope_rate: 200.0,
            smoothing_window: 5,
            threshold_percentile: 0.85,
            min_peak_distance_sec: 0.03,
            estimator: BpmEstimator::new(),
        }
    }
}

impl BeatAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyze a whole buffer
    pub fn analyze(&self, buffer: &PcmBuffer) -> BeatAnalysis {
        let sample_rate = buffer.sample_rate();
        if buffer.is_empty() {
            return BeatAnalysis {
                bpm: 120.0,
                confidence: 0.0,
                peak_times_sec: Vec::new(),
                anchor_sec: 0.0,
            };
        }

        let mono = buffer.to_mono();
        let hop = ((sample_rate as f32 / self.envelope_rate) as usize).max(1);

        let envelope = rectified_envelope(&mono, hop);
        let smooth = moving_average(&envelope, self.smoothing_window);

        let effective_rate = sample_rate as f32 / hop as f32;
        let min_distance = ((self.min_peak_distance_sec * effective_rate).round() as usize).max(1);
        let peaks = find_local_peaks(&smooth, min_distance, self.threshold_percentile);

        let peak_times_sec: Vec<f64> = peaks
            .iter()
            .map(|&k| (k * hop) as f64 / sample_rate as f64)
            .collect();

        let estimate = self.estimator.estimate(&peak_times_sec);
        let anchor_sec = peak_times_sec.first().copied().unwrap_or(0.0);

        debug!(
            bpm = estimate.bpm,
            confidence = estimate.confidence,
            peaks = peak_times_sec.len(),
            "beat analysis complete"
        );

        BeatAnalysis {
            bpm: estimate.bpm,
            confidence: estimate.confidence,
            peak_times_sec,
            anchor_sec,
        }
    }
}

/// Mean absolute value of each `hop`-sized chunk
fn rectified_envelope(mono: &[f32], hop: usize) -> Vec<f32> {
    mono.chunks(hop)
        .map(|chunk| chunk.iter().map(|s| s.abs()).sum::<f32>() / chunk.len() as f32)
        .collect()
}

/// Trailing moving average; the first outputs average what is available
fn moving_average(x: &[f32], window: usize) -> Vec<f32> {
    let w = window.max(1);
    let mut out = Vec::with_capacity(x.len());
    let mut acc = 0.0f32;
    for i in 0..x.len() {
        acc += x[i];
        if i >= w {
            acc -= x[i - w];
        }
        out.push(acc / w.min(i + 1) as f32);
    }
    out
}

/// Value at percentile `p` (0.0 - 1.0) of an ascending slice
fn percentile(sorted: &[f32], p: f32) -> f32 {
    let last = sorted.len().saturating_sub(1);
    let idx = ((p * last as f32).floor() as usize).min(last);
    sorted[idx]
}

/// Indices of local maxima above the percentile threshold, at least
/// `min_distance` apart
fn find_local_peaks(x: &[f32], min_distance: usize, threshold_percentile: f32) -> Vec<usize> {
    if x.len() < 3 {
        return Vec::new();
    }

    let mut sorted = x.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let threshold = percentile(&sorted, threshold_percentile);

    let mut peaks = Vec::new();
    let mut last: Option<usize> = None;

    for i in 1..x.len() - 1 {
        if x[i] < threshold {
            continue;
        }
        if x[i] > x[i - 1] && x[i] >= x[i + 1] {
            let far_enough = last.map_or(true, |l| i - l >= min_distance);
            if far_enough {
                peaks.push(i);
                last = Some(i);
            }
        }
    }

    peaks
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Decaying noise bursts at a steady tempo
    fn click_track(bpm: f64, seconds: f64, sample_rate: u32, offset_sec: f64) -> PcmBuffer {
        let frames = (seconds * sample_rate as f64) as usize;
        let interval = (60.0 / bpm * sample_rate as f64) as usize;
        let offset = (offset_sec * sample_rate as f64) as usize;
        let click_len = sample_rate as usize / 50;
        let mut data = vec![0.0f32; frames];
        let mut start = offset;
        while start < frames {
            for i in 0..click_len.min(frames - start) {
                let decay = 1.0 - i as f32 / click_len as f32;
                let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                data[start + i] = 0.9 * decay * sign;
            }
            start += interval;
        }
        PcmBuffer::new(sample_rate, vec![data.clone(), data])
    }

    #[test]
    fn test_moving_average_warmup() {
        let out = moving_average(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(out, vec![1.0, 1.5, 2.5, 3.5]);
    }

    #[test]
    fn test_percentile() {
        let sorted: Vec<f32> = (0..101).map(|i| i as f32).collect();
        assert_eq!(percentile(&sorted, 0.85), 85.0);
        assert_eq!(percentile(&[3.0], 0.85), 3.0);
    }

    #[test]
    fn test_peaks_respect_min_distance() {
        let x = [0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let peaks = find_local_peaks(&x, 3, 0.5);
        assert_eq!(peaks, vec![1, 7]);
    }

    #[test]
    fn test_short_envelope_has_no_peaks() {
        assert!(find_local_peaks(&[1.0, 2.0], 1, 0.5).is_empty());
    }

    #[test]
    fn test_analyze_click_track() {
        let buffer = click_track(120.0, 12.0, 44100, 0.2);
        let analysis = BeatAnalyzer::new().analyze(&buffer);
        assert!(
            (analysis.bpm - 120.0).abs() <= 1.0,
            "expected ~120 BPM, got {}",
            analysis.bpm
        );
        assert!(analysis.confidence > 0.5, "confidence {}", analysis.confidence);
        assert!(analysis.peak_times_sec.len() >= 20);
        assert!((analysis.anchor_sec - 0.2).abs() < 0.05, "anchor {}", analysis.anchor_sec);
    }

    #[test]
    fn test_analyze_silence_falls_back() {
        let buffer = PcmBuffer::new(44100, vec![vec![0.0; 44100 * 3]]);
        let analysis = BeatAnalyzer::new().analyze(&buffer);
        assert_eq!(analysis.bpm, 120.0);
        assert_eq!(analysis.confidence, 0.0);
        assert_eq!(analysis.anchor_sec, 0.0);
    }

    #[test]
    fn test_analyze_empty_buffer() {
        let analysis = BeatAnalyzer::new().analyze(&PcmBuffer::default());
        assert!(analysis.peak_times_sec.is_empty());
        assert_eq!(analysis.bpm, 120.0);
    }
}
