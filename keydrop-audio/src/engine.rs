//! Audio engine - orchestrates decks, effects racks, mixer, bus and sync

use crate::bus::{AudioBus, OutputTap};
use crate::context::EngineContext;
use crate::deck::{Deck, DeckId, DeckState, DeckTrack, ScratchOptions, ToneTarget};
use crate::effects::{EffectsRack, FxKind};
use crate::graph::{NodeKind, SignalGraph};
use crate::mixer::{CrossfaderCurve, Mixer};
use crate::sync::SyncService;
use crossbeam_channel::{bounded, Receiver, Sender};
use keydrop_analysis::BeatAnalysis;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Commands sent to the audio engine
#[derive(Debug, Clone)]
pub enum AudioCommand {
    // Deck commands
    Load(DeckId, DeckTrack),
    SetAnalysis(DeckId, Arc<BeatAnalysis>),
    Play(DeckId),
    Stop { deck: DeckId, hard: bool },
    TogglePlay(DeckId),
    Seek(DeckId, f64),
    SetCue(DeckId, u8),
    JumpToCue(DeckId, u8),
    AdjustParam(DeckId, ToneTarget, f32),
    SetParam(DeckId, ToneTarget, f32),
    SetPlaybackRate(DeckId, f32),

    // Scratch
    StartScratchHold(DeckId, Option<ScratchOptions>),
    StopScratchHold(DeckId),
    ScratchBurst(DeckId, Option<ScratchOptions>),

    // Effects
    ApplyFx(DeckId, Option<FxKind>),
    SetFxMix(DeckId, FxKind, f32),
    SetKickBpm(DeckId, f32),

    // Mixer and bus
    SetCrossfader(f32),
    AdjustCrossfader(f32),
    SetCrossfaderCurve(CrossfaderCurve),
    SetMasterVolume(f32),

    /// Align deck 2 to deck 1
    Sync,

    // System
    Shutdown,
}

/// Events sent from the audio engine
#[derive(Debug, Clone)]
pub enum AudioEvent {
    /// Polled snapshot for display
    StateUpdate {
        decks: Box<[DeckState; 2]>,
        crossfader: f32,
        master_volume: f32,
        active_fx: [Option<FxKind>; 2],
        analyses: [Option<Arc<BeatAnalysis>>; 2],
        /// Position within the current beat, when the deck has an analysis
        beat_phase: [Option<f32>; 2],
    },
    /// Track loaded successfully
    TrackLoaded { deck: DeckId },
    /// Error occurred
    Error(String),
}

/// Audio engine state (held behind the audio lock)
pub struct EngineState {
    ctx: Arc<EngineContext>,
    pub decks: [Deck; 2],
    pub racks: [EffectsRack; 2],
    pub mixer: Mixer,
    pub bus: AudioBus,
    graph: SignalGraph,
    /// Cached analysis per deck, cleared on load
    analyses: [Option<Arc<BeatAnalysis>>; 2],
    sync: SyncService,
    // Pre-allocated mixer inputs (avoids allocation in audio callback)
    mixer_inputs: [Vec<f32>; 2],
}

/// Engine state shared between the audio callback and the control thread
pub type SharedEngineState = Arc<Mutex<EngineState>>;

/// Initial block size for pre-allocated buffers (stereo samples)
const MAX_BUFFER_SIZE: usize = 4096;

impl EngineState {
    pub fn new(sample_rate: u32) -> Self {
        let ctx = EngineContext::new(sample_rate);
        let sr = ctx.sample_rate() as f32;
        let graph = match SignalGraph::dj_console() {
            Ok(graph) => graph,
            Err(e) => {
                // Static wiring; only reachable if the console layout is broken
                warn!(error = %e, "console graph failed to compile");
                SignalGraph::new()
            }
        };
        Self {
            decks: [
                Deck::new(DeckId::One, ctx.clone()),
                Deck::new(DeckId::Two, ctx.clone()),
            ],
            racks: [EffectsRack::new(sr), EffectsRack::new(sr)],
            mixer: Mixer::new(),
            bus: AudioBus::new(),
            graph,
            analyses: [None, None],
            sync: SyncService::new(),
            mixer_inputs: [vec![0.0; MAX_BUFFER_SIZE], vec![0.0; MAX_BUFFER_SIZE]],
            ctx,
        }
    }

    /// Wrap a new state for sharing with the audio callback
    pub fn shared(sample_rate: u32) -> SharedEngineState {
        Arc::new(Mutex::new(Self::new(sample_rate)))
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    pub fn sample_rate(&self) -> u32 {
        self.ctx.sample_rate()
    }

    pub fn deck(&self, id: DeckId) -> &Deck {
        &self.decks[id.index()]
    }

    pub fn rack(&self, id: DeckId) -> &EffectsRack {
        &self.racks[id.index()]
    }

    pub fn analysis(&self, id: DeckId) -> Option<&Arc<BeatAnalysis>> {
        self.analyses[id.index()].as_ref()
    }

    /// Open the outbound stream tap on the bus
    pub fn take_tap(&mut self, capacity: usize) -> OutputTap {
        self.bus.take_tap(capacity)
    }

    /// Process a command
    pub fn handle_command(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::Load(id, track) => {
                self.decks[id.index()].load(track);
                self.racks[id.index()].reset();
                self.analyses[id.index()] = None;
            }
            AudioCommand::SetAnalysis(id, analysis) => {
                self.racks[id.index()].set_kick_bpm(analysis.bpm);
                self.analyses[id.index()] = Some(analysis);
            }
            AudioCommand::Play(id) => self.decks[id.index()].play(),
            AudioCommand::Stop { deck, hard } => self.decks[deck.index()].stop(hard),
            AudioCommand::TogglePlay(id) => self.decks[id.index()].toggle_play(),
            AudioCommand::Seek(id, sec) => self.decks[id.index()].seek(sec),
            AudioCommand::SetCue(id, n) => self.decks[id.index()].set_cue(n),
            AudioCommand::JumpToCue(id, n) => self.decks[id.index()].jump_cue(n),
            AudioCommand::AdjustParam(id, target, delta) => {
                self.decks[id.index()].adjust_param(target, delta)
            }
            AudioCommand::SetParam(id, target, value) => {
                self.decks[id.index()].set_param(target, value)
            }
            AudioCommand::SetPlaybackRate(id, rate) => {
                self.decks[id.index()].set_playback_rate(rate)
            }

            AudioCommand::StartScratchHold(id, opts) => {
                self.decks[id.index()].start_scratch_hold(opts)
            }
            AudioCommand::StopScratchHold(id) => self.decks[id.index()].stop_scratch_hold(),
            AudioCommand::ScratchBurst(id, opts) => self.decks[id.index()].scratch_burst(opts),

            AudioCommand::ApplyFx(id, fx) => self.racks[id.index()].apply_fx(fx),
            AudioCommand::SetFxMix(id, kind, mix) => self.racks[id.index()].set_mix(kind, mix),
            AudioCommand::SetKickBpm(id, bpm) => self.racks[id.index()].set_kick_bpm(bpm),

            AudioCommand::SetCrossfader(pos) => self.mixer.set_crossfader(pos),
            AudioCommand::AdjustCrossfader(delta) => self.mixer.adjust_crossfader(delta),
            AudioCommand::SetCrossfaderCurve(curve) => self.mixer.set_curve(curve),
            AudioCommand::SetMasterVolume(vol) => self.bus.set_master_volume(vol),

            AudioCommand::Sync => self.sync_decks(),

            AudioCommand::Shutdown => {} // Handled at higher level
        }
    }

    /// Align deck 2 (slave) to deck 1 (master)
    fn sync_decks(&mut self) {
        let (Some(master_analysis), Some(slave_analysis)) =
            (self.analyses[0].clone(), self.analyses[1].clone())
        else {
            debug!("sync ignored, both decks need an analysis");
            return;
        };
        let [master, slave] = &mut self.decks;
        self.sync
            .sync_slave_to_master(master, slave, &master_analysis, &slave_analysis);
    }

    /// Generate current state for display
    pub fn get_state(&self) -> AudioEvent {
        let beat_phase = DeckId::ALL.map(|id| {
            let deck = &self.decks[id.index()];
            match &self.analyses[id.index()] {
                Some(a) if deck.is_loaded() => Some(a.grid().phase_at(deck.position_sec())),
                _ => None,
            }
        });

        AudioEvent::StateUpdate {
            decks: Box::new([self.decks[0].state(), self.decks[1].state()]),
            crossfader: self.mixer.crossfader(),
            master_volume: self.bus.master_volume(),
            active_fx: [self.racks[0].active_fx(), self.racks[1].active_fx()],
            analyses: self.analyses.clone(),
            beat_phase,
        }
    }

    /// Render one block of stereo interleaved output, walking the graph
    pub fn process(&mut self, output: &mut [f32]) {
        let len = output.len();
        output.fill(0.0);
        self.graph.prepare(len);
        for input in &mut self.mixer_inputs {
            // This should rarely happen after the first call
            if input.len() < len {
                input.resize(len, 0.0);
            }
        }

        for i in 0..self.graph.order().len() {
            let id = self.graph.order()[i];
            let mut buffer = self.graph.take_buffer(id);
            let block = &mut buffer[..len];

            match self.graph.kind(id) {
                NodeKind::Deck(deck) => self.decks[deck.index()].process(block),
                NodeKind::Rack(deck) => {
                    self.graph.gather(id, 0, block);
                    self.racks[deck.index()].process(block);
                }
                NodeKind::Mixer => {
                    let [a, b] = &mut self.mixer_inputs;
                    let (a, b) = (&mut a[..len], &mut b[..len]);
                    a.fill(0.0);
                    b.fill(0.0);
                    self.graph.gather(id, 0, a);
                    self.graph.gather(id, 1, b);
                    self.mixer.mix(a, b, block);
                }
                NodeKind::Bus => {
                    self.graph.gather(id, 0, block);
                    self.bus.process(block, output);
                }
            }

            self.graph.restore_buffer(id, buffer);
        }

        self.ctx.advance((len / 2) as u64);
    }
}

/// Render into `output` from the audio callback without ever blocking
///
/// Outputs silence if the control thread currently holds the lock.
pub fn render_or_silence(state: &SharedEngineState, output: &mut [f32]) {
    match state.try_lock() {
        Some(mut engine) => engine.process(output),
        None => output.fill(0.0),
    }
}

/// Handle to communicate with the audio engine
pub struct AudioEngine {
    /// Send commands to the control thread
    pub command_tx: Sender<AudioCommand>,
    /// Receive events from the control thread
    pub event_rx: Receiver<AudioEvent>,
    /// Shutdown flag
    shutdown: Arc<AtomicBool>,
}

impl AudioEngine {
    /// Create channels for engine communication
    /// Buffer size of 1024 provides headroom for command bursts without saturation
    pub fn create_channels() -> (
        Sender<AudioCommand>,
        Receiver<AudioCommand>,
        Sender<AudioEvent>,
        Receiver<AudioEvent>,
    ) {
        let (cmd_tx, cmd_rx) = bounded(1024);
        let (evt_tx, evt_rx) = bounded(1024);
        (cmd_tx, cmd_rx, evt_tx, evt_rx)
    }

    /// Create a new engine handle
    pub fn new(command_tx: Sender<AudioCommand>, event_rx: Receiver<AudioEvent>) -> Self {
        Self {
            command_tx,
            event_rx,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Send a command to the audio engine
    pub fn send(&self, cmd: AudioCommand) {
        if self.command_tx.try_send(cmd).is_err() {
            debug!("command dropped, engine queue full or closed");
        }
    }

    /// Per-deck controls
    pub fn deck(&self, id: DeckId) -> DeckController<'_> {
        DeckController { engine: self, id }
    }

    /// Mixer-level controls
    pub fn mixer(&self) -> MixerController<'_> {
        MixerController { engine: self }
    }

    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Request shutdown
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let _ = self.command_tx.try_send(AudioCommand::Shutdown);
    }
}

/// Controls for one deck, as used by input handling
pub struct DeckController<'a> {
    engine: &'a AudioEngine,
    id: DeckId,
}

impl DeckController<'_> {
    pub fn adjust_param(&self, target: ToneTarget, delta: f32) {
        self.engine
            .send(AudioCommand::AdjustParam(self.id, target, delta));
    }

    pub fn jump_to_cue(&self, index: u8) {
        self.engine.send(AudioCommand::JumpToCue(self.id, index));
    }

    pub fn set_cue(&self, index: u8) {
        self.engine.send(AudioCommand::SetCue(self.id, index));
    }

    pub fn toggle_play(&self) {
        self.engine.send(AudioCommand::TogglePlay(self.id));
    }

    pub fn apply_fx(&self, fx: Option<FxKind>) {
        self.engine.send(AudioCommand::ApplyFx(self.id, fx));
    }

    pub fn start_scratch_hold(&self, options: Option<ScratchOptions>) {
        self.engine
            .send(AudioCommand::StartScratchHold(self.id, options));
    }

    pub fn stop_scratch_hold(&self) {
        self.engine.send(AudioCommand::StopScratchHold(self.id));
    }

    pub fn scratch_burst(&self, options: Option<ScratchOptions>) {
        self.engine.send(AudioCommand::ScratchBurst(self.id, options));
    }
}

/// Crossfader and sync controls
pub struct MixerController<'a> {
    engine: &'a AudioEngine,
}

impl MixerController<'_> {
    pub fn adjust_crossfader(&self, delta: f32) {
        self.engine.send(AudioCommand::AdjustCrossfader(delta));
    }

    pub fn set_crossfader(&self, position: f32) {
        self.engine.send(AudioCommand::SetCrossfader(position));
    }

    pub fn sync(&self) {
        self.engine.send(AudioCommand::Sync);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keydrop_analysis::PcmBuffer;

    const SR: u32 = 8000;

    fn track(seconds: f64) -> DeckTrack {
        let frames = (seconds * SR as f64) as usize;
        DeckTrack::new(Arc::new(PcmBuffer::new(SR, vec![vec![0.3; frames]; 2])))
    }

    fn analysis(bpm: f32) -> Arc<BeatAnalysis> {
        Arc::new(BeatAnalysis {
            bpm,
            confidence: 1.0,
            peak_times_sec: Vec::new(),
            anchor_sec: 0.0,
        })
    }

    #[test]
    fn test_silent_without_tracks() {
        let mut engine = EngineState::new(SR);
        let mut out = vec![1.0f32; 512];
        engine.process(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(engine.context().now_frames(), 256);
    }

    #[test]
    fn test_load_resets_effect_state() {
        let mut engine = EngineState::new(SR);
        engine.handle_command(AudioCommand::Load(DeckId::One, track(5.0)));
        engine.handle_command(AudioCommand::ApplyFx(DeckId::One, Some(FxKind::Kick)));
        engine.handle_command(AudioCommand::Play(DeckId::One));
        let mut out = vec![0.0f32; 160];
        engine.process(&mut out);
        assert!(engine.rack(DeckId::One).kick().pump_gain() < 0.5);

        engine.handle_command(AudioCommand::Load(DeckId::One, track(5.0)));
        assert_eq!(engine.rack(DeckId::One).kick().pump_gain(), 1.0);
        assert!(engine.rack(DeckId::One).kick().is_pumping());
    }

    #[test]
    fn test_load_clears_analysis() {
        let mut engine = EngineState::new(SR);
        engine.handle_command(AudioCommand::Load(DeckId::One, track(5.0)));
        engine.handle_command(AudioCommand::SetAnalysis(DeckId::One, analysis(128.0)));
        assert!(engine.analysis(DeckId::One).is_some());
        assert_eq!(engine.rack(DeckId::One).kick().bpm(), 128.0);

        engine.handle_command(AudioCommand::Load(DeckId::One, track(5.0)));
        assert!(engine.analysis(DeckId::One).is_none());
    }

    #[test]
    fn test_sync_requires_both_analyses() {
        let mut engine = EngineState::new(SR);
        engine.handle_command(AudioCommand::Load(DeckId::One, track(5.0)));
        engine.handle_command(AudioCommand::Load(DeckId::Two, track(5.0)));
        engine.handle_command(AudioCommand::SetAnalysis(DeckId::One, analysis(128.0)));
        engine.handle_command(AudioCommand::Seek(DeckId::Two, 1.3));
        engine.handle_command(AudioCommand::Sync);
        assert!((engine.deck(DeckId::Two).position_sec() - 1.3).abs() < 1e-9);
    }

    #[test]
    fn test_state_update_reflects_controls() {
        let mut engine = EngineState::new(SR);
        engine.handle_command(AudioCommand::Load(DeckId::Two, track(5.0)));
        engine.handle_command(AudioCommand::SetAnalysis(DeckId::Two, analysis(120.0)));
        engine.handle_command(AudioCommand::AdjustCrossfader(0.4));
        engine.handle_command(AudioCommand::SetMasterVolume(1.2));
        engine.handle_command(AudioCommand::ApplyFx(DeckId::Two, Some(FxKind::Slicer)));

        match engine.get_state() {
            AudioEvent::StateUpdate {
                decks,
                crossfader,
                master_volume,
                active_fx,
                analyses,
                beat_phase,
            } => {
                assert!(decks[1].loaded && !decks[0].loaded);
                assert!((crossfader - 0.4).abs() < 1e-6);
                assert_eq!(master_volume, 1.2);
                assert_eq!(active_fx, [None, Some(FxKind::Slicer)]);
                assert!(analyses[0].is_none() && analyses[1].is_some());
                assert_eq!(beat_phase, [None, Some(0.0)]);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_render_or_silence_on_contention() {
        let shared = EngineState::shared(SR);
        let _guard = shared.lock();
        let mut out = vec![1.0f32; 64];
        render_or_silence(&shared, &mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_controllers_send_commands() {
        let (cmd_tx, cmd_rx, _evt_tx, evt_rx) = AudioEngine::create_channels();
        let engine = AudioEngine::new(cmd_tx, evt_rx);
        engine.deck(DeckId::Two).toggle_play();
        engine.mixer().sync();
        engine.shutdown();

        assert!(matches!(cmd_rx.try_recv(), Ok(AudioCommand::TogglePlay(DeckId::Two))));
        assert!(matches!(cmd_rx.try_recv(), Ok(AudioCommand::Sync)));
        assert!(matches!(cmd_rx.try_recv(), Ok(AudioCommand::Shutdown)));
        assert!(engine.is_shutdown());
    }
}
