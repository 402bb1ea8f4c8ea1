//! Keydrop - two-deck DJ console
//!
//! Plays through the default output device and takes commands from stdin.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use keydrop_analysis::BeatAnalyzer;
use keydrop_audio::{
    render_or_silence, AudioCommand, AudioEngine, AudioEvent, CrossfaderCurve, DeckId, DeckState,
    DeckTrack, EngineState, SharedEngineState,
};
use keydrop_input::{parse_line, Command, HELP};
use keydrop_library::{Config, TrackLoader};

/// Interval between state snapshots (~30 Hz)
const STATE_UPDATE_INTERVAL: Duration = Duration::from_millis(33);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let mut config = Config::load();

    let (cmd_tx, cmd_rx, evt_tx, evt_rx) = AudioEngine::create_channels();
    let shutdown = Arc::new(AtomicBool::new(false));

    // The audio thread reports the device rate (or why it failed) once
    let (ready_tx, ready_rx) = bounded::<Result<u32, String>>(1);
    let audio_handle = {
        let evt_tx = evt_tx.clone();
        let shutdown = shutdown.clone();
        let preferred_rate = config.sample_rate;
        thread::Builder::new()
            .name("keydrop-audio".into())
            .spawn(move || run_audio_thread(cmd_rx, evt_tx, ready_tx, shutdown, preferred_rate))
            .context("failed to spawn audio thread")?
    };

    let sample_rate = ready_rx
        .recv()
        .map_err(|_| anyhow!("audio thread exited during startup"))?
        .map_err(|e| anyhow!(e))?;
    info!(sample_rate, "audio output running");

    let engine = AudioEngine::new(cmd_tx, evt_rx);
    engine.send(AudioCommand::SetMasterVolume(config.master_volume));
    match config.crossfader_curve.parse::<CrossfaderCurve>() {
        Ok(curve) => engine.send(AudioCommand::SetCrossfaderCurve(curve)),
        Err(e) => warn!(error = %e, "ignoring configured crossfader curve"),
    }

    let result = run_console(&engine, &evt_tx, &mut config, sample_rate);

    engine.shutdown();
    shutdown.store(true, Ordering::SeqCst);
    if audio_handle.join().is_err() {
        error!("audio thread panicked");
    }

    if let Err(e) = config.save() {
        warn!(error = %e, "failed to save config");
    }

    result
}

fn run_audio_thread(
    cmd_rx: Receiver<AudioCommand>,
    evt_tx: Sender<AudioEvent>,
    ready_tx: Sender<Result<u32, String>>,
    shutdown: Arc<AtomicBool>,
    preferred_rate: u32,
) {
    let host = cpal::default_host();
    let Some(device) = host.default_output_device() else {
        let _ = ready_tx.send(Err("No audio output device found".into()));
        return;
    };

    let supported = match device.default_output_config() {
        Ok(c) => c,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("Failed to get audio config: {}", e)));
            return;
        }
    };

    let stream_config: cpal::StreamConfig = supported.into();
    if stream_config.sample_rate.0 != preferred_rate {
        info!(
            device = stream_config.sample_rate.0,
            preferred = preferred_rate,
            "using device sample rate"
        );
    }
    let sample_rate = stream_config.sample_rate.0;
    let channels = stream_config.channels as usize;

    let engine_state: SharedEngineState = EngineState::shared(sample_rate);
    let engine_for_callback = engine_state.clone();

    // Stereo render buffer (grown only if the device asks for a larger block)
    let mut stereo = vec![0.0f32; 16384];

    let stream = device.build_output_stream(
        &stream_config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            if channels == 2 {
                render_or_silence(&engine_for_callback, data);
                return;
            }

            let frames = data.len() / channels.max(1);
            if stereo.len() < frames * 2 {
                stereo.resize(frames * 2, 0.0);
            }
            let block = &mut stereo[..frames * 2];
            render_or_silence(&engine_for_callback, block);

            for (out, frame) in data.chunks_mut(channels.max(1)).zip(block.chunks(2)) {
                if out.len() == 1 {
                    out[0] = (frame[0] + frame[1]) * 0.5;
                } else {
                    out[0] = frame[0];
                    out[1] = frame[1];
                    out[2..].fill(0.0);
                }
            }
        },
        |err| {
            error!(error = %err, "audio stream error");
        },
        None,
    );

    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("Failed to create audio stream: {}", e)));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(format!("Failed to start audio: {}", e)));
        return;
    }
    let _ = ready_tx.send(Ok(sample_rate));

    // Command processing loop
    let mut last_state_update = Instant::now();
    while !shutdown.load(Ordering::Relaxed) {
        match cmd_rx.recv_timeout(Duration::from_millis(10)) {
            Ok(AudioCommand::Shutdown) => break,
            Ok(cmd) => {
                let loaded = match &cmd {
                    AudioCommand::Load(deck, _) => Some(*deck),
                    _ => None,
                };
                engine_state.lock().handle_command(cmd);
                if let Some(deck) = loaded {
                    let _ = evt_tx.try_send(AudioEvent::TrackLoaded { deck });
                }
            }
            Err(_) => {}
        }

        if last_state_update.elapsed() >= STATE_UPDATE_INTERVAL {
            let state = engine_state.lock().get_state();
            let _ = evt_tx.try_send(state);
            last_state_update = Instant::now();
        }
    }
}

/// Latest polled view of the engine
#[derive(Default)]
struct ConsoleView {
    decks: [DeckState; 2],
    crossfader: f32,
    master_volume: f32,
    lines: [String; 2],
}

impl ConsoleView {
    fn apply(&mut self, event: AudioEvent) {
        match event {
            AudioEvent::StateUpdate {
                decks,
                crossfader,
                master_volume,
                active_fx,
                analyses,
                beat_phase,
            } => {
                self.decks = *decks;
                self.crossfader = crossfader;
                self.master_volume = master_volume;
                for id in DeckId::ALL {
                    let i = id.index();
                    let bpm = analyses[i]
                        .as_ref()
                        .map(|a| format!("{:.1} bpm ({:.0}%)", a.bpm, a.confidence * 100.0))
                        .unwrap_or_else(|| "-- bpm".to_string());
                    let phase = beat_phase[i]
                        .map(|p| format!(" phase {:.2}", p))
                        .unwrap_or_default();
                    let fx = active_fx[i].map(|f| f.to_string()).unwrap_or_else(|| "off".into());
                    self.lines[i] = format!("{}{} fx {}", bpm, phase, fx);
                }
            }
            AudioEvent::TrackLoaded { deck } => println!("deck {} loaded", deck),
            AudioEvent::Error(msg) => eprintln!("error: {}", msg),
        }
    }

    fn print(&self) {
        for id in DeckId::ALL {
            let d = &self.decks[id.index()];
            if !d.loaded {
                println!("deck {}: empty", id);
                continue;
            }
            let cue = |c: Option<f64>| c.map(|s| format!("{:.2}", s)).unwrap_or_else(|| "-".into());
            println!(
                "deck {}: {} {:>7.2}/{:.2}s rate {:.3} cues [{} {}]{} | {}",
                id,
                if d.is_playing { "playing" } else { "stopped" },
                d.position_sec,
                d.duration_sec,
                d.playback_rate,
                cue(d.cues[0]),
                cue(d.cues[1]),
                d.scratching.map(|m| format!(" scratch {:?}", m)).unwrap_or_default(),
                self.lines[id.index()],
            );
        }
        println!(
            "crossfader {:+.2}  master {:.2}",
            self.crossfader, self.master_volume
        );
    }
}

fn run_console(
    engine: &AudioEngine,
    evt_tx: &Sender<AudioEvent>,
    config: &mut Config,
    sample_rate: u32,
) -> anyhow::Result<()> {
    // Keep the view current even while the console waits for input
    let view = Arc::new(Mutex::new(ConsoleView::default()));
    {
        let view = view.clone();
        let event_rx = engine.event_rx.clone();
        thread::Builder::new()
            .name("keydrop-events".into())
            .spawn(move || {
                for event in event_rx.iter() {
                    view.lock().apply(event);
                }
            })
            .context("failed to spawn event thread")?;
    }
    // Directories of tracks that decoded successfully
    let (loaded_tx, loaded_rx) = bounded::<PathBuf>(16);
    let stdin = io::stdin();

    println!("keydrop ready - type 'help' for commands");
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        let read = stdin.lock().read_line(&mut line)?;
        remember_loaded(config, &loaded_rx);
        if read == 0 {
            break; // EOF
        }

        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_line(&line) {
            Ok(c) => c,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match command {
            Command::Quit => break,
            Command::Help => println!("{}", HELP),
            Command::Status => view.lock().print(),
            Command::Load(deck, path) => {
                let path = config.resolve_track_path(&path);
                spawn_loader(
                    deck,
                    path,
                    sample_rate,
                    engine.command_tx.clone(),
                    evt_tx.clone(),
                    loaded_tx.clone(),
                );
            }
            other => {
                if let Some(cmd) = other.into_audio() {
                    engine.send(cmd);
                }
            }
        }
    }

    remember_loaded(config, &loaded_rx);
    Ok(())
}

/// Record the directories of tracks the loaders decoded successfully
fn remember_loaded(config: &mut Config, loaded_rx: &Receiver<PathBuf>) {
    for path in loaded_rx.try_iter() {
        config.remember_track(&path);
    }
}

/// Decode and analyze off the console thread, then hand the track to the engine
fn spawn_loader(
    deck: DeckId,
    path: PathBuf,
    sample_rate: u32,
    cmd_tx: Sender<AudioCommand>,
    evt_tx: Sender<AudioEvent>,
    loaded_tx: Sender<PathBuf>,
) {
    let spawned = thread::Builder::new()
        .name(format!("keydrop-load-{}", deck))
        .spawn(move || {
            let loader = TrackLoader::with_sample_rate(sample_rate);
            let track = match loader.load(&path) {
                Ok(t) => t,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "load failed");
                    let _ = evt_tx.try_send(AudioEvent::Error(format!(
                        "{}: {}",
                        path.display(),
                        e
                    )));
                    return;
                }
            };

            let _ = loaded_tx.try_send(path.clone());

            let analysis = BeatAnalyzer::new().analyze(&track.buffer);
            info!(
                deck = %deck,
                track = %track.display_name(),
                bpm = analysis.bpm,
                confidence = analysis.confidence,
                "track ready"
            );

            let deck_track = DeckTrack::new(Arc::new(track.buffer));
            // Blocking sends: the load must not be dropped when the queue is busy
            let _ = cmd_tx.send(AudioCommand::Load(deck, deck_track));
            let _ = cmd_tx.send(AudioCommand::SetAnalysis(deck, Arc::new(analysis)));
        });

    if let Err(e) = spawned {
        error!(error = %e, "failed to spawn loader thread");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_load_is_not_remembered() {
        let (loaded_tx, loaded_rx) = bounded::<PathBuf>(4);
        let (cmd_tx, _cmd_rx) = bounded(4);
        let (evt_tx, evt_rx) = bounded(4);
        let mut config = Config::default();

        let missing = std::env::temp_dir().join("keydrop-missing-dir").join("nope.wav");
        spawn_loader(DeckId::One, missing, 48000, cmd_tx, evt_tx, loaded_tx);

        let event = evt_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(event, AudioEvent::Error(_)));
        remember_loaded(&mut config, &loaded_rx);
        assert_eq!(config.last_track_dir, None);
    }

    #[test]
    fn test_loaded_track_dir_is_remembered() {
        let (loaded_tx, loaded_rx) = bounded::<PathBuf>(4);
        let mut config = Config::default();
        loaded_tx.send(PathBuf::from("/music/set/one.flac")).unwrap();
        remember_loaded(&mut config, &loaded_rx);
        assert_eq!(config.last_track_dir, Some(PathBuf::from("/music/set")));
    }
}
