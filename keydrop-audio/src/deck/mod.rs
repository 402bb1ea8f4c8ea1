//! Deck implementation - track playback, cues, tone and scratch

mod scratch;
mod tone;

pub use scratch::{ScratchMode, ScratchOptions};
pub use tone::{ToneControls, ToneTarget};

use crate::context::EngineContext;
use crate::timer::LinearRamp;
use keydrop_analysis::PcmBuffer;
use scratch::{Grain, ScratchSession};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Deck identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeckId {
    One,
    Two,
}

impl DeckId {
    pub const ALL: [DeckId; 2] = [DeckId::One, DeckId::Two];

    /// Array index (0 or 1)
    pub fn index(self) -> usize {
        match self {
            DeckId::One => 0,
            DeckId::Two => 1,
        }
    }

    /// Deck number as printed on the console (1 or 2)
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(DeckId::One),
            2 => Some(DeckId::Two),
            _ => None,
        }
    }
}

impl fmt::Display for DeckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// A decoded track ready to load, with its reversed copy precomputed
///
/// Reversing a whole track is too slow for the audio lock, so it happens
/// wherever the track is prepared. Both halves are `Arc` so the track moves
/// through channels without copying.
#[derive(Debug, Clone)]
pub struct DeckTrack {
    forward: Arc<PcmBuffer>,
    reversed: Arc<PcmBuffer>,
}

impl DeckTrack {
    pub fn new(buffer: Arc<PcmBuffer>) -> Self {
        let reversed = Arc::new(buffer.reversed());
        Self {
            forward: buffer,
            reversed,
        }
    }

    pub fn buffer(&self) -> &Arc<PcmBuffer> {
        &self.forward
    }

    pub fn duration_sec(&self) -> f64 {
        self.forward.duration_sec()
    }
}

/// Deck snapshot for polling
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeckState {
    pub loaded: bool,
    pub is_playing: bool,
    pub duration_sec: f64,
    pub position_sec: f64,
    pub playback_rate: f32,
    /// Cue slots 1 and 2
    pub cues: [Option<f64>; 2],
    pub scratching: Option<ScratchMode>,
}

/// Playback cursor: position is derived from the engine clock
#[derive(Debug, Clone, Copy, Default)]
struct Transport {
    started_at_sec: f64,
    offset_sec: f64,
    is_playing: bool,
}

/// A single DJ deck
pub struct Deck {
    id: DeckId,
    ctx: Arc<EngineContext>,
    track: Option<DeckTrack>,
    transport: Transport,
    /// Playback speed (1.0 = normal)
    rate: f32,
    rate_ramp: LinearRamp,
    cues: [Option<f64>; 2],
    tone: ToneControls,
    scratch: Option<ScratchSession>,
    grains: Vec<Grain>,
    /// Pre-allocated grain mix buffer (avoid allocation in process())
    grain_buffer: Vec<f32>,
}

impl Deck {
    pub const MIN_RATE: f32 = 0.5;
    pub const MAX_RATE: f32 = 2.0;

    const MAX_GRAINS: usize = 16;
    const GRAIN_BUFFER_SIZE: usize = 8192;

    /// Create a new empty deck
    pub fn new(id: DeckId, ctx: Arc<EngineContext>) -> Self {
        let tone = ToneControls::new(ctx.sample_rate() as f32);
        Self {
            id,
            ctx,
            track: None,
            transport: Transport::default(),
            rate: 1.0,
            rate_ramp: LinearRamp::new(1.0),
            cues: [None; 2],
            tone,
            scratch: None,
            grains: Vec::with_capacity(Self::MAX_GRAINS),
            grain_buffer: vec![0.0; Self::GRAIN_BUFFER_SIZE],
        }
    }

    pub fn id(&self) -> DeckId {
        self.id
    }

    /// Replace the track, resetting position, cues, rate and any scratch
    pub fn load(&mut self, track: DeckTrack) {
        self.scratch = None;
        self.grains.clear();
        self.transport = Transport::default();
        self.cues = [None; 2];
        self.rate = 1.0;
        self.rate_ramp.set(1.0);
        self.tone.reset();
        info!(
            deck = %self.id,
            duration = track.duration_sec(),
            "track loaded"
        );
        self.track = Some(track);
    }

    /// Check if deck has a playable track loaded
    pub fn is_loaded(&self) -> bool {
        self.track.as_ref().is_some_and(|t| !t.forward.is_empty())
    }

    pub fn track(&self) -> Option<&DeckTrack> {
        self.track.as_ref()
    }

    pub fn duration_sec(&self) -> f64 {
        self.track.as_ref().map_or(0.0, |t| t.duration_sec())
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing
    }

    /// Current position, clamped to the track
    pub fn position_sec(&self) -> f64 {
        let t = &self.transport;
        let pos = if t.is_playing {
            t.offset_sec + (self.ctx.now_sec() - t.started_at_sec) * self.rate as f64
        } else {
            t.offset_sec
        };
        pos.clamp(0.0, self.duration_sec())
    }

    fn start_at(&mut self, offset_sec: f64) {
        self.transport = Transport {
            started_at_sec: self.ctx.now_sec(),
            offset_sec: offset_sec.clamp(0.0, self.duration_sec()),
            is_playing: true,
        };
    }

    fn halt(&mut self) {
        if self.transport.is_playing {
            self.transport.offset_sec = self.position_sec();
            self.transport.is_playing = false;
        }
    }

    /// Start playback; no-op without a track
    ///
    /// During a scratch this only arranges for playback to resume when the
    /// gesture ends.
    pub fn play(&mut self) {
        if !self.is_loaded() {
            debug!(deck = %self.id, "play ignored, no track");
            return;
        }
        if let Some(session) = self.scratch.as_mut() {
            session.resume_playing = true;
            return;
        }
        if self.transport.is_playing {
            return;
        }
        self.start_at(self.transport.offset_sec);
    }

    /// Stop playback; `hard_reset` also rewinds to 0
    pub fn stop(&mut self, hard_reset: bool) {
        if !self.is_loaded() {
            return;
        }
        if let Some(session) = self.scratch.as_mut() {
            session.resume_playing = false;
            if hard_reset {
                session.base_sec = 0.0;
            }
            return;
        }
        self.halt();
        if hard_reset {
            self.transport.offset_sec = 0.0;
        }
    }

    /// Whether the deck is playing or will resume after a scratch
    fn intends_to_play(&self) -> bool {
        match &self.scratch {
            Some(session) => session.resume_playing,
            None => self.transport.is_playing,
        }
    }

    /// Toggle play/pause
    pub fn toggle_play(&mut self) {
        if self.intends_to_play() {
            self.stop(false);
        } else {
            self.play();
        }
    }

    /// Move to `sec` (clamped); a playing deck restarts from there
    pub fn seek(&mut self, sec: f64) {
        if !self.is_loaded() || !sec.is_finite() {
            return;
        }
        let target = sec.clamp(0.0, self.duration_sec());
        if let Some(session) = self.scratch.as_mut() {
            session.base_sec = target;
            return;
        }
        if self.transport.is_playing {
            self.start_at(target);
        } else {
            self.transport.offset_sec = target;
        }
    }

    fn cue_slot(index: u8) -> Option<usize> {
        match index {
            1 | 2 => Some(index as usize - 1),
            _ => None,
        }
    }

    /// Store the current position in cue slot 1 or 2
    pub fn set_cue(&mut self, index: u8) {
        if !self.is_loaded() {
            return;
        }
        if let Some(slot) = Self::cue_slot(index) {
            let pos = match &self.scratch {
                Some(session) => session.base_sec,
                None => self.position_sec(),
            };
            self.cues[slot] = Some(pos);
        }
    }

    /// Seek to a stored cue; unset cues are ignored
    pub fn jump_cue(&mut self, index: u8) {
        match self.cue(index) {
            Some(pos) => self.seek(pos),
            None => debug!(deck = %self.id, index, "cue not set"),
        }
    }

    pub fn cue(&self, index: u8) -> Option<f64> {
        Self::cue_slot(index).and_then(|slot| self.cues[slot])
    }

    pub fn tone(&self) -> &ToneControls {
        &self.tone
    }

    pub fn tone_mut(&mut self) -> &mut ToneControls {
        &mut self.tone
    }

    pub fn adjust_param(&mut self, target: ToneTarget, delta: f32) {
        self.tone.adjust_param(target, delta);
    }

    pub fn set_param(&mut self, target: ToneTarget, value: f32) {
        self.tone.set_param(target, value);
    }

    pub fn playback_rate(&self) -> f32 {
        self.rate
    }

    /// Change speed, keeping the position continuous
    fn apply_rate(&mut self, rate: f32) {
        let rate = rate.clamp(Self::MIN_RATE, Self::MAX_RATE);
        if self.transport.is_playing {
            self.transport.offset_sec = self.position_sec();
            self.transport.started_at_sec = self.ctx.now_sec();
        }
        self.rate = rate;
    }

    /// Set playback speed immediately (0.5 - 2.0)
    pub fn set_playback_rate(&mut self, rate: f32) {
        if !rate.is_finite() {
            return;
        }
        self.rate_ramp.set(rate.clamp(Self::MIN_RATE, Self::MAX_RATE));
        self.apply_rate(rate);
    }

    /// Glide playback speed to `target` over `seconds`
    pub fn ramp_playback_rate(&mut self, target: f32, seconds: f64) {
        if !target.is_finite() || !seconds.is_finite() {
            return;
        }
        let target = target.clamp(Self::MIN_RATE, Self::MAX_RATE);
        self.rate_ramp.set(self.rate);
        self.rate_ramp.linear_ramp_to(target, self.ctx.frames_for(seconds));
    }

    /// Active scratch gesture, if any
    pub fn scratch_mode(&self) -> Option<ScratchMode> {
        self.scratch.as_ref().map(|s| s.mode)
    }

    fn start_scratch(&mut self, mode: ScratchMode, options: &ScratchOptions) {
        if !self.is_loaded() {
            return;
        }
        if self.scratch.is_some() {
            debug!(deck = %self.id, ?mode, "scratch already active");
            return;
        }
        let resume_playing = self.transport.is_playing;
        let base_sec = self.position_sec();
        self.halt();
        self.scratch = Some(ScratchSession::new(
            mode,
            options,
            base_sec,
            resume_playing,
            self.ctx.sample_rate(),
        ));
        debug!(deck = %self.id, ?mode, base_sec, "scratch started");
    }

    /// Restore position and play state after a gesture
    fn finish_scratch(&mut self, session: ScratchSession) {
        self.seek(session.base_sec);
        if session.resume_playing {
            self.play();
        }
    }

    /// Begin a sustained scratch; no-op if one is already running
    pub fn start_scratch_hold(&mut self, options: Option<ScratchOptions>) {
        self.start_scratch(ScratchMode::Hold, &options.unwrap_or_default());
    }

    /// Release a held scratch; no-op unless a hold is active
    pub fn stop_scratch_hold(&mut self) {
        match self.scratch.take() {
            Some(session) if session.mode == ScratchMode::Hold => self.finish_scratch(session),
            other => self.scratch = other,
        }
    }

    /// Fire a finite burst of alternating grains
    pub fn scratch_burst(&mut self, options: Option<ScratchOptions>) {
        self.start_scratch(ScratchMode::Burst, &options.unwrap_or_default());
    }

    /// Get deck state for polling
    pub fn state(&self) -> DeckState {
        DeckState {
            loaded: self.is_loaded(),
            is_playing: self.transport.is_playing,
            duration_sec: self.duration_sec(),
            position_sec: self.position_sec(),
            playback_rate: self.rate,
            cues: self.cues,
            scratching: self.scratch_mode(),
        }
    }

    /// Render one block of stereo interleaved output
    ///
    /// Grains bypass the EQ and filter but still pass through the fader.
    pub fn process(&mut self, output: &mut [f32]) {
        output.fill(0.0);
        let frames = output.len() / 2;
        if frames == 0 {
            return;
        }

        if self.rate_ramp.is_active() {
            let rate = self.rate_ramp.advance(frames as u64);
            self.apply_rate(rate);
        }

        let Some(track) = self.track.clone() else {
            return;
        };
        if track.forward.is_empty() {
            return;
        }

        let mut grain_buffer = std::mem::take(&mut self.grain_buffer);
        if grain_buffer.len() < frames * 2 {
            grain_buffer.resize(frames * 2, 0.0);
        }
        let grain_out = &mut grain_buffer[..frames * 2];
        grain_out.fill(0.0);
        self.render_scratch(&track, grain_out);

        if self.transport.is_playing {
            self.render_transport(&track.forward, output);
        }
        self.tone.process_eq(output);

        for (out, grain) in output.iter_mut().zip(grain_out.iter()) {
            *out += grain;
        }
        self.grain_buffer = grain_buffer;

        self.tone.process_fader(output);
    }

    /// Tick the scratch timer and mix every sounding grain into `out`
    fn render_scratch(&mut self, track: &DeckTrack, out: &mut [f32]) {
        if self.scratch.is_none() && self.grains.is_empty() {
            return;
        }
        let duration = track.duration_sec();
        let engine_rate = self.ctx.sample_rate();

        for frame in out.chunks_exact_mut(2) {
            let mut finished = None;
            if let Some(session) = self.scratch.as_mut() {
                if session.timer.tick() {
                    let (request, done) = session.fire(duration);
                    let source = if request.reverse { &track.reversed } else { &track.forward };
                    if self.grains.len() < Self::MAX_GRAINS {
                        self.grains.push(Grain::new(request, session, source, engine_rate));
                    }
                    if done {
                        finished = self.scratch.take();
                    }
                }
            }
            if let Some(session) = finished {
                self.finish_scratch(session);
            }

            for grain in self.grains.iter_mut() {
                let source = if grain.is_reverse() { &track.reversed } else { &track.forward };
                if let Some((l, r)) = grain.next(source) {
                    frame[0] += l;
                    frame[1] += r;
                }
            }
        }

        self.grains.retain(|g| !g.is_done());
    }

    /// Read the track at the transport position; stops at the end
    fn render_transport(&mut self, buffer: &PcmBuffer, output: &mut [f32]) {
        let total = buffer.frames();
        let source_rate = buffer.sample_rate() as f64;
        let step = self.rate as f64 * source_rate / self.ctx.sample_rate() as f64;
        let mut cursor = self.position_sec() * source_rate;

        for frame in output.chunks_exact_mut(2) {
            if cursor as usize + 1 >= total {
                // End of track
                self.transport = Transport::default();
                return;
            }
            let (l, r) = read_stereo(buffer, cursor);
            frame[0] = l;
            frame[1] = r;
            cursor += step;
        }
    }
}

/// Linearly interpolated stereo frame at a fractional position; mono is
/// duplicated and positions past the end read silence
#[inline]
pub(crate) fn read_stereo(buffer: &PcmBuffer, position: f64) -> (f32, f32) {
    let total = buffer.frames();
    if position < 0.0 || total == 0 {
        return (0.0, 0.0);
    }
    let idx = position as usize;
    if idx >= total {
        return (0.0, 0.0);
    }
    let frac = (position - idx as f64) as f32;
    let next = (idx + 1).min(total - 1);

    let left = buffer.channel(0).unwrap_or(&[]);
    let right = buffer.channel(1).unwrap_or(left);
    let lerp = |ch: &[f32]| match (ch.get(idx), ch.get(next)) {
        (Some(&a), Some(&b)) => a + frac * (b - a),
        _ => 0.0,
    };
    (lerp(left), lerp(right))
}
