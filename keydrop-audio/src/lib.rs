//! Audio engine for Keydrop - decks, effects, mixer and sync
//!
//! This module provides the core audio processing pipeline:
//! - Deck: Track playback, cues, tone controls and scratch grains
//! - Effects: Per-deck insert chain (crush, flanger, slicer, kick)
//! - Mixer: Equal-power crossfader
//! - Bus: Master volume, soft clip and the outbound stream tap
//! - Sync: One-shot beat alignment of deck 2 to deck 1
//!
//! Blocks are rendered by walking a static signal graph; everything that
//! needs timing (grains, kick pumps, rate ramps) counts samples.

mod bus;
mod context;
mod deck;
mod effects;
mod engine;
mod graph;
mod mixer;
mod sync;
mod timer;

pub use bus::{AudioBus, OutputTap};
pub use context::EngineContext;
pub use deck::{
    Deck, DeckId, DeckState, DeckTrack, ScratchMode, ScratchOptions, ToneControls, ToneTarget,
};
pub use effects::{Crush, Effect, EffectsRack, Flanger, FxKind, Kick, Slicer};
pub use engine::{
    render_or_silence, AudioCommand, AudioEngine, AudioEvent, DeckController, EngineState,
    MixerController, SharedEngineState,
};
pub use graph::{Edge, GraphError, NodeId, NodeKind, SignalGraph};
pub use mixer::{CrossfaderCurve, Mixer};
pub use sync::{SyncCorrection, SyncService};
pub use timer::{LinearRamp, PeriodicTimer};
