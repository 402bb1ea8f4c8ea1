//! Engine context - sample rate and render clock shared by all components

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared engine context
///
/// Created once at startup and handed to every deck. The clock counts
/// frames rendered so far; the renderer advances it after each block, so
/// during control operations it reads the start of the next block.
#[derive(Debug)]
pub struct EngineContext {
    sample_rate: u32,
    frames: AtomicU64,
}

impl EngineContext {
    /// Create a new context
    pub fn new(sample_rate: u32) -> Arc<Self> {
        Arc::new(Self {
            sample_rate: sample_rate.max(1),
            frames: AtomicU64::new(0),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames rendered since startup
    pub fn now_frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Engine clock in seconds
    pub fn now_sec(&self) -> f64 {
        self.now_frames() as f64 / self.sample_rate as f64
    }

    /// Advance the clock after a rendered block
    pub fn advance(&self, frames: u64) {
        self.frames.fetch_add(frames, Ordering::Relaxed);
    }

    /// Convert a duration in seconds to whole frames (at least 1)
    pub fn frames_for(&self, seconds: f64) -> u64 {
        ((seconds * self.sample_rate as f64).round() as u64).max(1)
    }
}
