//! Command definitions for Keydrop

use keydrop_audio::{AudioCommand, CrossfaderCurve, DeckId, FxKind, ToneTarget};
use std::path::PathBuf;

/// Commands that can be dispatched from the console
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Track loading (handled by the app, not the engine)
    Load(DeckId, PathBuf),

    // Playback
    TogglePlay(DeckId),
    Stop(DeckId),
    Seek(DeckId, f64),
    SetRate(DeckId, f32),

    // Cue points
    SetCue(DeckId, u8),
    JumpCue(DeckId, u8),

    // Tone
    AdjustParam(DeckId, ToneTarget, f32),

    // Effects
    ApplyFx(DeckId, Option<FxKind>),
    SetFxMix(DeckId, FxKind, f32),
    SetKickBpm(DeckId, f32),

    // Scratch
    ScratchHold(DeckId),
    ScratchRelease(DeckId),
    ScratchBurst(DeckId),

    // Mixer
    AdjustCrossfader(f32),
    CenterCrossfader,
    SetCrossfaderCurve(CrossfaderCurve),
    SetMasterVolume(f32),
    Sync,

    // Application
    Status,
    Help,
    Quit,
}

impl Command {
    /// Engine command for this console command
    ///
    /// Returns `None` for commands the application handles itself.
    pub fn into_audio(self) -> Option<AudioCommand> {
        let cmd = match self {
            Command::TogglePlay(d) => AudioCommand::TogglePlay(d),
            Command::Stop(d) => AudioCommand::Stop { deck: d, hard: true },
            Command::Seek(d, sec) => AudioCommand::Seek(d, sec),
            Command::SetRate(d, rate) => AudioCommand::SetPlaybackRate(d, rate),
            Command::SetCue(d, n) => AudioCommand::SetCue(d, n),
            Command::JumpCue(d, n) => AudioCommand::JumpToCue(d, n),
            Command::AdjustParam(d, target, delta) => AudioCommand::AdjustParam(d, target, delta),
            Command::ApplyFx(d, fx) => AudioCommand::ApplyFx(d, fx),
            Command::SetFxMix(d, kind, mix) => AudioCommand::SetFxMix(d, kind, mix),
            Command::SetKickBpm(d, bpm) => AudioCommand::SetKickBpm(d, bpm),
            Command::ScratchHold(d) => AudioCommand::StartScratchHold(d, None),
            Command::ScratchRelease(d) => AudioCommand::StopScratchHold(d),
            Command::ScratchBurst(d) => AudioCommand::ScratchBurst(d, None),
            Command::AdjustCrossfader(delta) => AudioCommand::AdjustCrossfader(delta),
            Command::CenterCrossfader => AudioCommand::SetCrossfader(0.0),
            Command::SetCrossfaderCurve(curve) => AudioCommand::SetCrossfaderCurve(curve),
            Command::SetMasterVolume(v) => AudioCommand::SetMasterVolume(v),
            Command::Sync => AudioCommand::Sync,
            Command::Load(..) | Command::Status | Command::Help | Command::Quit => return None,
        };
        Some(cmd)
    }
}

/// Console help text
pub const HELP: &str = "\
load <1|2> <path>          load a track onto a deck
<d> play                   toggle play/pause
<d> stop                   stop and rewind
<d> seek <sec>             move the playhead
<d> rate <0.5-2.0>         playback speed
<d> cue set <1|2>          store a cue point
<d> cue <1|2>              jump to a cue point
<d> <mid|bass|filter|fader> <+/-delta>
<d> fx <crush|flanger|slicer|kick|off>
<d> mix <fx> <0-1>         set one effect's wet mix
<d> kickbpm <bpm>          kick pump tempo
<d> scratch <hold|release|burst>
xf <+/-delta> | xf center  crossfader
curve <constant_power|linear|cut>
vol <0-2>                  master volume
sync                       align deck 2 to deck 1
status | help | quit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_is_hard_reset() {
        let cmd = Command::Stop(DeckId::One).into_audio();
        assert!(matches!(
            cmd,
            Some(AudioCommand::Stop {
                deck: DeckId::One,
                hard: true
            })
        ));
    }

    #[test]
    fn test_app_commands_have_no_engine_form() {
        assert!(Command::Quit.into_audio().is_none());
        assert!(Command::Status.into_audio().is_none());
        assert!(Command::Load(DeckId::Two, PathBuf::from("a.mp3"))
            .into_audio()
            .is_none());
    }

    #[test]
    fn test_center_crossfader() {
        assert!(matches!(
            Command::CenterCrossfader.into_audio(),
            Some(AudioCommand::SetCrossfader(x)) if x == 0.0
        ));
    }
}
