//! Scratch gestures built from short forward and reverse grains

use super::read_stereo;
use crate::timer::PeriodicTimer;
use keydrop_analysis::PcmBuffer;

/// Tuning for a scratch gesture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScratchOptions {
    /// Length of one grain in ms
    pub grain_ms: f32,
    /// Time between grain starts in ms
    pub jump_ms: f32,
    /// Scales how far grains wander from the base position
    pub intensity: f32,
    /// Number of grains in a burst
    pub bursts: u32,
}

impl Default for ScratchOptions {
    fn default() -> Self {
        Self {
            grain_ms: 45.0,
            jump_ms: 22.0,
            intensity: 1.0,
            bursts: 18,
        }
    }
}

impl ScratchOptions {
    pub fn grain_sec(&self) -> f64 {
        self.grain_ms.max(1.0) as f64 / 1000.0
    }

    /// Click guard at the start of each grain
    pub fn fade_sec(&self) -> f64 {
        (self.grain_sec() * 0.3).min(0.015)
    }

    pub fn jump_sec(&self) -> f64 {
        self.jump_ms.max(1.0) as f64 / 1000.0
    }
}

/// Which scratch gesture is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScratchMode {
    /// Repeats until released
    Hold,
    /// Fixed number of grains, then restores itself
    Burst,
}

/// Grain to start, as decided by a session tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GrainRequest {
    pub reverse: bool,
    pub position_sec: f64,
}

/// State that exists only while a scratch gesture is active
#[derive(Debug, Clone)]
pub(crate) struct ScratchSession {
    pub mode: ScratchMode,
    /// Position the deck returns to afterwards
    pub base_sec: f64,
    /// Whether playback resumes afterwards
    pub resume_playing: bool,
    pub grain_sec: f64,
    pub fade_sec: f64,
    pub timer: PeriodicTimer,
    reach_sec: f64,
    forward: bool,
    /// Grains left in a burst
    remaining: u32,
}

impl ScratchSession {
    const HOLD_REACH_SEC: f64 = 0.12;
    const BURST_REACH_SEC: f64 = 10.0;

    pub fn new(
        mode: ScratchMode,
        options: &ScratchOptions,
        base_sec: f64,
        resume_playing: bool,
        sample_rate: u32,
    ) -> Self {
        let reach = match mode {
            ScratchMode::Hold => Self::HOLD_REACH_SEC,
            ScratchMode::Burst => Self::BURST_REACH_SEC,
        };
        let period = (options.jump_sec() * sample_rate as f64).round() as u64;
        Self {
            mode,
            base_sec,
            resume_playing,
            grain_sec: options.grain_sec(),
            fade_sec: options.fade_sec(),
            timer: PeriodicTimer::new(period),
            reach_sec: reach * options.intensity.max(0.0) as f64,
            forward: true,
            remaining: options.bursts.max(1),
        }
    }

    /// Handle one timer fire; returns the grain to start and whether the
    /// gesture has finished
    pub fn fire(&mut self, duration_sec: f64) -> (GrainRequest, bool) {
        let dir = if self.forward { 1.0 } else { -1.0 };
        let target = self.base_sec + dir * self.reach_sec;
        let position_sec = match self.mode {
            ScratchMode::Hold => target.clamp(0.0, (duration_sec - self.grain_sec).max(0.0)),
            ScratchMode::Burst => target.max(0.0),
        };
        let request = GrainRequest {
            reverse: !self.forward,
            position_sec,
        };
        self.forward = !self.forward;

        let finished = match self.mode {
            ScratchMode::Hold => false,
            ScratchMode::Burst => {
                self.remaining -= 1;
                self.remaining == 0
            }
        };
        (request, finished)
    }
}

/// Start offset of a grain in its source buffer
///
/// Reverse grains read the reversed buffer, where time runs backwards, so
/// the offset is mirrored: `duration - position - grain`.
pub(crate) fn grain_offset(reverse: bool, position_sec: f64, grain_sec: f64, duration_sec: f64) -> f64 {
    let max = (duration_sec - grain_sec).max(0.0);
    if reverse {
        (duration_sec - position_sec - grain_sec).clamp(0.0, max)
    } else {
        position_sec.clamp(0.0, max)
    }
}

/// One sounding grain
#[derive(Debug, Clone)]
pub(crate) struct Grain {
    reverse: bool,
    /// Read position in source frames
    cursor: f64,
    /// Source frames per output frame
    step: f64,
    elapsed: u64,
    length: u64,
    fade: u64,
}

impl Grain {
    pub fn new(
        request: GrainRequest,
        session: &ScratchSession,
        source: &PcmBuffer,
        engine_rate: u32,
    ) -> Self {
        let offset = grain_offset(
            request.reverse,
            request.position_sec,
            session.grain_sec,
            source.duration_sec(),
        );
        let source_rate = source.sample_rate() as f64;
        let engine_rate = engine_rate as f64;
        let length = ((session.grain_sec * engine_rate).round() as u64).max(2);
        let fade = ((session.fade_sec * engine_rate).round() as u64).clamp(1, length - 1);
        Self {
            reverse: request.reverse,
            cursor: offset * source_rate,
            step: source_rate / engine_rate,
            elapsed: 0,
            length,
            fade,
        }
    }

    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    pub fn is_done(&self) -> bool {
        self.elapsed >= self.length
    }

    /// Envelope: linear 0 -> 1 over the fade, then linear down to 0 at the end
    #[inline]
    fn gain(&self) -> f32 {
        let n = self.elapsed;
        if n < self.fade {
            n as f32 / self.fade as f32
        } else {
            1.0 - (n - self.fade) as f32 / (self.length - self.fade) as f32
        }
    }

    /// Next output frame, reading from the buffer matching the grain direction
    #[inline]
    pub fn next(&mut self, source: &PcmBuffer) -> Option<(f32, f32)> {
        if self.is_done() {
            return None;
        }
        let gain = self.gain();
        let (l, r) = read_stereo(source, self.cursor);
        self.cursor += self.step;
        self.elapsed += 1;
        Some((l * gain, r * gain))
    }
}
