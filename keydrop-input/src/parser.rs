//! Console line parser

use crate::commands::Command;
use keydrop_audio::{CrossfaderCurve, DeckId, FxKind, ToneTarget};
use std::path::PathBuf;
use thiserror::Error;

/// Why a console line was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("expected deck 1 or 2, got '{0}'")]
    BadDeck(String),

    #[error("invalid number '{0}'")]
    BadNumber(String),

    #[error("missing argument: {0}")]
    Missing(&'static str),

    #[error("unknown effect: {0}")]
    UnknownEffect(String),

    #[error("cue index must be 1 or 2, got {0}")]
    BadCue(String),
}

/// Parse one console line into a command
pub fn parse_line(line: &str) -> Result<Command, ParseError> {
    let input = line.trim();
    let mut words = input.split_whitespace();
    let Some(head) = words.next() else {
        return Err(ParseError::Empty);
    };

    match head {
        "q" | "quit" | "exit" => Ok(Command::Quit),
        "help" | "?" => Ok(Command::Help),
        "status" => Ok(Command::Status),
        "sync" => Ok(Command::Sync),
        "load" => parse_load(input),
        "xf" => match words.next() {
            Some("center") => Ok(Command::CenterCrossfader),
            Some(delta) => Ok(Command::AdjustCrossfader(number(delta)?)),
            None => Err(ParseError::Missing("crossfader delta")),
        },
        "vol" => {
            let v = words.next().ok_or(ParseError::Missing("volume"))?;
            Ok(Command::SetMasterVolume(number(v)?))
        }
        "curve" => {
            let name = words.next().ok_or(ParseError::Missing("curve name"))?;
            name.parse::<CrossfaderCurve>()
                .map(Command::SetCrossfaderCurve)
                .map_err(|_| ParseError::Unknown(name.to_string()))
        }
        _ if head.parse::<u8>().is_ok() => {
            let deck = deck(head)?;
            parse_deck_command(deck, &words.collect::<Vec<_>>())
        }
        _ => Err(ParseError::Unknown(head.to_string())),
    }
}

/// `load <deck> <path>`, where the path may contain spaces or be quoted
fn parse_load(input: &str) -> Result<Command, ParseError> {
    let rest = input["load".len()..].trim_start();
    let (deck_word, path) = rest
        .split_once(char::is_whitespace)
        .ok_or(ParseError::Missing("deck and path"))?;
    let deck = deck(deck_word)?;

    let path = path.trim();
    let path = if path.len() >= 2
        && ((path.starts_with('\'') && path.ends_with('\''))
            || (path.starts_with('"') && path.ends_with('"')))
    {
        &path[1..path.len() - 1]
    } else {
        path
    };

    if path.is_empty() {
        return Err(ParseError::Missing("path"));
    }
    Ok(Command::Load(deck, PathBuf::from(path)))
}

fn parse_deck_command(deck: DeckId, args: &[&str]) -> Result<Command, ParseError> {
    let verb = *args.first().ok_or(ParseError::Missing("deck command"))?;
    let arg = |i: usize, what: &'static str| args.get(i).copied().ok_or(ParseError::Missing(what));

    match verb {
        "play" => Ok(Command::TogglePlay(deck)),
        "stop" => Ok(Command::Stop(deck)),
        "seek" => Ok(Command::Seek(deck, number(arg(1, "seconds")?)?)),
        "rate" => Ok(Command::SetRate(deck, number(arg(1, "rate")?)?)),
        "cue" => match arg(1, "cue index")? {
            "set" => Ok(Command::SetCue(deck, cue(arg(2, "cue index")?)?)),
            n => Ok(Command::JumpCue(deck, cue(n)?)),
        },
        "fx" => match arg(1, "effect")? {
            "off" | "none" => Ok(Command::ApplyFx(deck, None)),
            name => Ok(Command::ApplyFx(deck, Some(effect(name)?))),
        },
        "mix" => {
            let kind = effect(arg(1, "effect")?)?;
            Ok(Command::SetFxMix(deck, kind, number(arg(2, "mix")?)?))
        }
        "kickbpm" => Ok(Command::SetKickBpm(deck, number(arg(1, "bpm")?)?)),
        "scratch" => match arg(1, "scratch mode")? {
            "hold" => Ok(Command::ScratchHold(deck)),
            "release" => Ok(Command::ScratchRelease(deck)),
            "burst" => Ok(Command::ScratchBurst(deck)),
            other => Err(ParseError::Unknown(format!("scratch {}", other))),
        },
        other => match ToneTarget::from_name(other) {
            Some(target) => Ok(Command::AdjustParam(deck, target, number(arg(1, "delta")?)?)),
            None => Err(ParseError::Unknown(other.to_string())),
        },
    }
}

fn deck(word: &str) -> Result<DeckId, ParseError> {
    word.parse::<u8>()
        .ok()
        .and_then(DeckId::from_number)
        .ok_or_else(|| ParseError::BadDeck(word.to_string()))
}

fn cue(word: &str) -> Result<u8, ParseError> {
    match word {
        "1" => Ok(1),
        "2" => Ok(2),
        _ => Err(ParseError::BadCue(word.to_string())),
    }
}

fn effect(word: &str) -> Result<FxKind, ParseError> {
    FxKind::from_name(word).ok_or_else(|| ParseError::UnknownEffect(word.to_string()))
}

/// Parse a finite number; `nan` and `inf` are rejected
fn number<T: std::str::FromStr>(word: &str) -> Result<T, ParseError> {
    let finite = word.parse::<f64>().is_ok_and(f64::is_finite);
    match word.parse::<T>() {
        Ok(value) if finite => Ok(value),
        _ => Err(ParseError::BadNumber(word.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse_line("quit"), Ok(Command::Quit));
        assert_eq!(parse_line("  q "), Ok(Command::Quit));
        assert_eq!(parse_line("sync"), Ok(Command::Sync));
        assert_eq!(parse_line("status"), Ok(Command::Status));
        assert_eq!(parse_line(""), Err(ParseError::Empty));
    }

    #[test]
    fn test_load_with_spaces_and_quotes() {
        assert_eq!(
            parse_line("load 1 my track.mp3"),
            Ok(Command::Load(DeckId::One, PathBuf::from("my track.mp3")))
        );
        assert_eq!(
            parse_line("load 2 \"/music/a b.flac\""),
            Ok(Command::Load(DeckId::Two, PathBuf::from("/music/a b.flac")))
        );
        assert_eq!(parse_line("load 3 x.mp3"), Err(ParseError::BadDeck("3".into())));
        assert!(parse_line("load 1").is_err());
    }

    #[test]
    fn test_deck_transport() {
        assert_eq!(parse_line("1 play"), Ok(Command::TogglePlay(DeckId::One)));
        assert_eq!(parse_line("2 stop"), Ok(Command::Stop(DeckId::Two)));
        assert_eq!(parse_line("1 seek 12.5"), Ok(Command::Seek(DeckId::One, 12.5)));
        assert_eq!(parse_line("2 rate 1.02"), Ok(Command::SetRate(DeckId::Two, 1.02)));
    }

    #[test]
    fn test_cues() {
        assert_eq!(parse_line("1 cue set 1"), Ok(Command::SetCue(DeckId::One, 1)));
        assert_eq!(parse_line("1 cue 2"), Ok(Command::JumpCue(DeckId::One, 2)));
        assert_eq!(parse_line("1 cue 3"), Err(ParseError::BadCue("3".into())));
    }

    #[test]
    fn test_tone_params() {
        assert_eq!(
            parse_line("2 bass +0.1"),
            Ok(Command::AdjustParam(DeckId::Two, ToneTarget::Bass, 0.1))
        );
        assert_eq!(
            parse_line("1 filter -0.25"),
            Ok(Command::AdjustParam(DeckId::One, ToneTarget::Filter, -0.25))
        );
        assert_eq!(parse_line("1 mid lots"), Err(ParseError::BadNumber("lots".into())));
        assert_eq!(parse_line("1 treble 0.1"), Err(ParseError::Unknown("treble".into())));
    }

    #[test]
    fn test_effects() {
        assert_eq!(
            parse_line("1 fx crush"),
            Ok(Command::ApplyFx(DeckId::One, Some(FxKind::Crush)))
        );
        assert_eq!(parse_line("1 fx off"), Ok(Command::ApplyFx(DeckId::One, None)));
        assert_eq!(
            parse_line("2 mix flanger 0.5"),
            Ok(Command::SetFxMix(DeckId::Two, FxKind::Flanger, 0.5))
        );
        assert_eq!(parse_line("2 kickbpm 126"), Ok(Command::SetKickBpm(DeckId::Two, 126.0)));
        assert_eq!(
            parse_line("1 fx reverb"),
            Err(ParseError::UnknownEffect("reverb".into()))
        );
    }

    #[test]
    fn test_scratch() {
        assert_eq!(parse_line("1 scratch hold"), Ok(Command::ScratchHold(DeckId::One)));
        assert_eq!(parse_line("1 scratch release"), Ok(Command::ScratchRelease(DeckId::One)));
        assert_eq!(parse_line("2 scratch burst"), Ok(Command::ScratchBurst(DeckId::Two)));
        assert!(parse_line("2 scratch wiggle").is_err());
    }

    #[test]
    fn test_mixer() {
        assert_eq!(parse_line("xf -0.2"), Ok(Command::AdjustCrossfader(-0.2)));
        assert_eq!(parse_line("xf center"), Ok(Command::CenterCrossfader));
        assert_eq!(parse_line("vol 0.8"), Ok(Command::SetMasterVolume(0.8)));
        assert_eq!(
            parse_line("curve linear"),
            Ok(Command::SetCrossfaderCurve(CrossfaderCurve::Linear))
        );
        assert_eq!(parse_line("xf"), Err(ParseError::Missing("crossfader delta")));
    }

    #[test]
    fn test_non_finite_numbers_rejected() {
        assert_eq!(parse_line("xf nan"), Err(ParseError::BadNumber("nan".into())));
        assert_eq!(parse_line("vol inf"), Err(ParseError::BadNumber("inf".into())));
        assert_eq!(parse_line("1 seek -inf"), Err(ParseError::BadNumber("-inf".into())));
        assert_eq!(parse_line("2 bass NaN"), Err(ParseError::BadNumber("NaN".into())));
    }

    #[test]
    fn test_bad_deck() {
        assert_eq!(parse_line("7 play"), Err(ParseError::BadDeck("7".into())));
        assert_eq!(parse_line("dance"), Err(ParseError::Unknown("dance".into())));
        assert_eq!(parse_line("1"), Err(ParseError::Missing("deck command")));
    }
}
