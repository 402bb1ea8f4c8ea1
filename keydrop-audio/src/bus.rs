//! Output bus - master volume, soft clipping and the outbound stream tap

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Consumer side of the bus tap
///
/// Receives exactly the samples written to the device (stereo interleaved),
/// for broadcast or recording collaborators running on another thread.
pub struct OutputTap {
    consumer: HeapCons<f32>,
}

impl OutputTap {
    /// Pop up to `out.len()` samples; returns how many were written
    pub fn read(&mut self, out: &mut [f32]) -> usize {
        self.consumer.pop_slice(out)
    }

    /// Samples waiting to be read
    pub fn available(&self) -> usize {
        self.consumer.occupied_len()
    }
}

/// Final summing stage shared by both decks
pub struct AudioBus {
    master_volume: f32,
    /// Smoothed master volume (interpolates toward master_volume to prevent clicks)
    smoothed_master_volume: f32,
    tap: Option<HeapProd<f32>>,
    /// Samples the tap could not accept
    dropped: u64,
}

impl AudioBus {
    pub const DEFAULT_MASTER_VOLUME: f32 = 0.9;

    /// Smoothing coefficient for master volume (~5ms at 48kHz)
    const MASTER_VOLUME_SMOOTH_COEFF: f32 = 0.995;

    pub fn new() -> Self {
        Self {
            master_volume: Self::DEFAULT_MASTER_VOLUME,
            smoothed_master_volume: Self::DEFAULT_MASTER_VOLUME,
            tap: None,
            dropped: 0,
        }
    }

    /// Set master volume (0.0 - 2.0)
    pub fn set_master_volume(&mut self, volume: f32) {
        if !volume.is_finite() {
            return;
        }
        self.master_volume = volume.clamp(0.0, 2.0);
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Open the outbound tap, replacing any previous one
    pub fn take_tap(&mut self, capacity: usize) -> OutputTap {
        let (producer, consumer) = HeapRb::<f32>::new(capacity.max(2)).split();
        self.tap = Some(producer);
        self.dropped = 0;
        OutputTap { consumer }
    }

    /// Samples dropped because the tap reader fell behind
    pub fn dropped_samples(&self) -> u64 {
        self.dropped
    }

    /// Apply master volume and soft clip `input` into `output`, then copy
    /// the result to the tap
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        let len = input.len().min(output.len());

        for i in (0..len).step_by(2) {
            self.smoothed_master_volume = Self::MASTER_VOLUME_SMOOTH_COEFF
                * self.smoothed_master_volume
                + (1.0 - Self::MASTER_VOLUME_SMOOTH_COEFF) * self.master_volume;

            output[i] = soft_clip(input[i] * self.smoothed_master_volume);
            if i + 1 < len {
                output[i + 1] = soft_clip(input[i + 1] * self.smoothed_master_volume);
            }
        }

        if let Some(tap) = self.tap.as_mut() {
            let pushed = tap.push_slice(&output[..len]);
            self.dropped += (len - pushed) as u64;
        }
    }
}

impl Default for AudioBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Soft clip threshold - lower value gives more headroom before the knee
const SOFT_CLIP_THRESHOLD: f32 = 0.75;
/// Soft clip ceiling
const SOFT_CLIP_CEILING: f32 = 0.89;

/// Gentle soft clipper for the master bus
///
/// Transparent below the threshold; above it the signal approaches the
/// ceiling along an exponential knee.
#[inline(always)]
fn soft_clip(x: f32) -> f32 {
    let abs_x = x.abs();

    if abs_x <= SOFT_CLIP_THRESHOLD {
        return x;
    }

    let sign = x.signum();
    let knee_width = SOFT_CLIP_CEILING - SOFT_CLIP_THRESHOLD;
    let over = abs_x - SOFT_CLIP_THRESHOLD;
    let ratio = over / knee_width;

    let compressed = SOFT_CLIP_THRESHOLD + knee_width * (1.0 - (-ratio * 3.0).exp());
    sign * compressed.min(SOFT_CLIP_CEILING)
}
