//! Sample-counted scheduling primitives
//!
//! Everything here is ticked from the render loop, one call per frame, so
//! grain and pump timing is deterministic regardless of thread jitter.

use std::collections::VecDeque;

/// A repeating timer measured in frames
#[derive(Debug, Clone)]
pub struct PeriodicTimer {
    period: u64,
    /// Frames left before the next fire
    remaining: u64,
}

impl PeriodicTimer {
    /// Timer whose first fire happens one full period from now
    pub fn new(period_frames: u64) -> Self {
        let period = period_frames.max(1);
        Self {
            period,
            remaining: period,
        }
    }

    /// Timer that fires on the very next tick, then every period
    pub fn immediate(period_frames: u64) -> Self {
        Self {
            period: period_frames.max(1),
            remaining: 0,
        }
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    /// Advance one frame; returns true if the timer fires on this frame
    #[inline]
    pub fn tick(&mut self) -> bool {
        let fire = self.remaining == 0;
        if fire {
            self.remaining = self.period;
        }
        self.remaining -= 1;
        fire
    }
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    target: f32,
    frames: u64,
}

/// Piecewise-linear parameter ramp
///
/// Segments queue up behind each other; each ramps linearly from wherever
/// the previous one ended to its own target.
#[derive(Debug, Clone)]
pub struct LinearRamp {
    value: f32,
    step: f32,
    remaining: u64,
    pending: VecDeque<Segment>,
}

impl LinearRamp {
    pub fn new(value: f32) -> Self {
        Self {
            value,
            step: 0.0,
            remaining: 0,
            pending: VecDeque::with_capacity(4),
        }
    }

    /// Current value
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Whether any ramp is still running or queued
    pub fn is_active(&self) -> bool {
        self.remaining > 0 || !self.pending.is_empty()
    }

    /// Drop every scheduled segment and hold the current value
    pub fn cancel_and_hold(&mut self) {
        self.pending.clear();
        self.remaining = 0;
        self.step = 0.0;
    }

    /// Jump to `value` immediately, cancelling any ramps
    pub fn set(&mut self, value: f32) {
        self.cancel_and_hold();
        self.value = value;
    }

    /// Queue a linear ramp to `target` lasting `frames` frames
    pub fn linear_ramp_to(&mut self, target: f32, frames: u64) {
        self.pending.push_back(Segment {
            target,
            frames: frames.max(1),
        });
        if self.remaining == 0 {
            self.start_next();
        }
    }

    fn start_next(&mut self) {
        if let Some(seg) = self.pending.pop_front() {
            self.step = (seg.target - self.value) / seg.frames as f32;
            self.remaining = seg.frames;
            // Remember the exact target for the final frame
            self.pending.push_front(Segment {
                target: seg.target,
                frames: 0,
            });
        }
    }

    /// Advance one frame and return the new value
    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            if self.remaining == 0 {
                if let Some(done) = self.pending.pop_front() {
                    self.value = done.target;
                }
                self.step = 0.0;
                self.start_next();
            } else {
                self.value += self.step;
            }
        }
        self.value
    }

    /// Advance `frames` frames and return the value afterwards
    pub fn advance(&mut self, frames: u64) -> f32 {
        let mut left = frames;
        while left > 0 && self.remaining > 0 {
            if left < self.remaining {
                self.value += self.step * left as f32;
                self.remaining -= left;
                left = 0;
            } else {
                left -= self.remaining;
                self.remaining = 1;
                self.next();
            }
        }
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_fires_after_period() {
        let mut t = PeriodicTimer::new(4);
        let fired: Vec<bool> = (0..9).map(|_| t.tick()).collect();
        assert_eq!(
            fired,
            vec![false, false, false, false, true, false, false, false, true]
        );
    }

    #[test]
    fn test_immediate_timer() {
        let mut t = PeriodicTimer::immediate(3);
        let fired: Vec<bool> = (0..7).map(|_| t.tick()).collect();
        assert_eq!(fired, vec![true, false, false, true, false, false, true]);
    }

    #[test]
    fn test_zero_period_is_clamped() {
        let mut t = PeriodicTimer::new(0);
        assert_eq!(t.period(), 1);
        assert!(t.tick());
        assert!(t.tick());
    }

    #[test]
    fn test_linear_ramp() {
        let mut a = LinearRamp::new(1.0);
        a.linear_ramp_to(0.0, 4);
        let values: Vec<f32> = (0..5).map(|_| a.next()).collect();
        assert!((values[0] - 0.75).abs() < 1e-6);
        assert!((values[1] - 0.5).abs() < 1e-6);
        assert_eq!(values[3], 0.0);
        assert_eq!(values[4], 0.0);
        assert!(!a.is_active());
    }

    #[test]
    fn test_chained_segments() {
        let mut a = LinearRamp::new(1.0);
        a.linear_ramp_to(0.1, 2);
        a.linear_ramp_to(1.0, 3);
        let values: Vec<f32> = (0..6).map(|_| a.next()).collect();
        assert!((values[1] - 0.1).abs() < 1e-6);
        assert!((values[2] - 0.4).abs() < 1e-6);
        assert_eq!(values[4], 1.0);
        assert_eq!(values[5], 1.0);
    }

    #[test]
    fn test_cancel_and_hold() {
        let mut a = LinearRamp::new(0.0);
        a.linear_ramp_to(1.0, 10);
        a.next();
        a.next();
        a.cancel_and_hold();
        let held = a.value();
        assert!((held - 0.2).abs() < 1e-6);
        assert_eq!(a.next(), held);
        assert!(!a.is_active());
    }

    #[test]
    fn test_advance_matches_stepping() {
        let mut a = LinearRamp::new(1.0);
        let mut b = LinearRamp::new(1.0);
        a.linear_ramp_to(1.02, 100);
        b.linear_ramp_to(1.02, 100);
        for _ in 0..37 {
            a.next();
        }
        assert!((b.advance(37) - a.value()).abs() < 1e-5);
        assert_eq!(b.advance(1000), 1.02);
        assert!(!b.is_active());
    }
}
