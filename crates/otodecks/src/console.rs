//! Line-oriented control console.
//!
//! Commands have the form `<control> <deck> [value]`, for example
//! `play a`, `volume b 0.8`, `load a ~/music/track.mp3` or `cue a 32.5`.

use std::path::PathBuf;

use otodecks_dj::{ControlId, ControlInput, ControlMap, DeckId, DeckSnapshot, DjCommand, DjEvent};

pub const HELP: &str = "\
commands:
  play <deck>              start playback
  stop <deck>              pause without rewinding
  load <deck> <path>       load a track
  eject <deck>             unload the track
  volume <deck> <0-1>      set gain
  speed <deck> <ratio>     set speed ratio (1 = normal)
  position <deck> <0-1>    seek to a fraction of the track
  seek <deck> <seconds>    seek to an absolute position
  cue <deck> [seconds]     add a cue at the playhead or at a position
  jump <deck>              jump to the next cue
  clear <deck>             clear all cues
  status                   show every deck
  help                     show this text
  quit                     exit";

/// A parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleAction {
    Command(DjCommand),
    Status,
    Help,
    Quit,
}

/// Parse one line of input.
pub fn parse_line(line: &str) -> Result<Option<ConsoleAction>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (verb, rest) = split_word(line);
    match verb.to_ascii_lowercase().as_str() {
        "status" | "ls" => return Ok(Some(ConsoleAction::Status)),
        "help" | "?" => return Ok(Some(ConsoleAction::Help)),
        "quit" | "exit" | "q" => return Ok(Some(ConsoleAction::Quit)),
        _ => {}
    }

    let (deck_label, argument) = split_word(rest);
    if deck_label.is_empty() {
        return Err(format!("'{}' needs a deck", verb));
    }
    let deck =
        DeckId::parse(deck_label).ok_or_else(|| format!("unknown deck '{}'", deck_label))?;

    if verb.eq_ignore_ascii_case("seek") {
        let position_seconds = parse_value(argument)?;
        return Ok(Some(ConsoleAction::Command(DjCommand::Seek {
            deck,
            position_seconds,
        })));
    }

    let control: ControlId = verb.parse()?;
    let input = match control {
        ControlId::Load => {
            if argument.is_empty() {
                return Err("load needs a file path".to_string());
            }
            ControlInput::File(expand_home(argument))
        }
        ControlId::Volume | ControlId::Speed | ControlId::Position => {
            ControlInput::Value(parse_value(argument)?)
        }
        ControlId::SetCue if !argument.is_empty() => ControlInput::Value(parse_value(argument)?),
        _ => ControlInput::Press,
    };

    ControlMap::translate(deck, control, input)
        .map(|command| Some(ConsoleAction::Command(command)))
        .ok_or_else(|| format!("'{}' does not take that input", control))
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim()),
        None => (s, ""),
    }
}

fn parse_value(s: &str) -> Result<f64, String> {
    if s.is_empty() {
        return Err("missing value".to_string());
    }
    s.parse::<f64>()
        .map_err(|_| format!("'{}' is not a number", s))
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Human-readable line for an event, or `None` for high-rate position
/// updates.
pub fn describe_event(event: &DjEvent) -> Option<String> {
    let line = match event {
        DjEvent::TrackLoaded {
            deck,
            source,
            length_seconds,
        } => format!(
            "[{}] loaded {} ({})",
            deck,
            source,
            format_time(*length_seconds)
        ),
        DjEvent::LoadFailed { deck, source, error } => {
            format!("[{}] could not load {}: {}", deck, source, error)
        }
        DjEvent::TrackEjected { deck } => format!("[{}] ejected", deck),
        DjEvent::PositionChanged { .. } => return None,
        DjEvent::CuesChanged {
            deck,
            cue_points,
            current_index,
        } => {
            if cue_points.is_empty() {
                format!("[{}] no cues", deck)
            } else {
                let cues: Vec<String> = cue_points
                    .iter()
                    .enumerate()
                    .map(|(i, p)| {
                        let marker = if *current_index == Some(i) { "*" } else { "" };
                        format!("{}{}", marker, format_time(*p))
                    })
                    .collect();
                format!("[{}] cues {}", deck, cues.join(" "))
            }
        }
        DjEvent::GainChanged { deck, gain } => format!("[{}] volume {:.2}", deck, gain),
        DjEvent::SpeedChanged { deck, ratio } => format!("[{}] speed {:.2}x", deck, ratio),
        DjEvent::PlaybackChanged { deck, playing } => {
            format!(
                "[{}] {}",
                deck,
                if *playing { "playing" } else { "stopped" }
            )
        }
        DjEvent::Warning { deck, error } => format!("[{}] {}", deck, error),
    };
    Some(line)
}

/// One status line per deck.
pub fn format_snapshot(snapshot: &DeckSnapshot) -> String {
    if !snapshot.loaded {
        return format!(
            "[{}] empty  volume {:.2}  speed {:.2}x",
            snapshot.id, snapshot.gain, snapshot.speed_ratio
        );
    }
    format!(
        "[{}] {:?}  {} / {} ({:.1}%)  volume {:.2}  speed {:.2}x  cues {}",
        snapshot.id,
        snapshot.state,
        format_time(snapshot.position_seconds),
        format_time(snapshot.track_length_seconds),
        snapshot.position_relative * 100.0,
        snapshot.gain,
        snapshot.speed_ratio,
        snapshot.cue_points.len()
    )
}

/// `m:ss.t` formatting.
pub fn format_time(seconds: f64) -> String {
    let tenths = (seconds.max(0.0) * 10.0).round() as u64;
    let minutes = tenths / 600;
    let rest = tenths % 600;
    format!("{}:{:02}.{}", minutes, rest / 10, rest % 10)
}

#[cfg(test)]
mod tests {
    use otodecks_dj::{DeckState, SourceRef};

    use super::*;

    fn command(line: &str) -> DjCommand {
        match parse_line(line) {
            Ok(Some(ConsoleAction::Command(command))) => command,
            other => panic!("expected a command for '{}', got {:?}", line, other),
        }
    }

    #[test]
    fn test_parse_transport() {
        assert_eq!(command("play a"), DjCommand::Play { deck: DeckId::A });
        assert_eq!(command("  STOP 2 "), DjCommand::Stop { deck: DeckId::B });
        assert_eq!(
            command("jump b"),
            DjCommand::JumpToNextCue { deck: DeckId::B }
        );
    }

    #[test]
    fn test_parse_values() {
        assert_eq!(
            command("volume a 0.5"),
            DjCommand::SetGain {
                deck: DeckId::A,
                gain: 0.5
            }
        );
        assert_eq!(
            command("position b 0.25"),
            DjCommand::SetPositionRelative {
                deck: DeckId::B,
                position: 0.25
            }
        );
        assert_eq!(
            command("seek a 12"),
            DjCommand::Seek {
                deck: DeckId::A,
                position_seconds: 12.0
            }
        );
        assert_eq!(command("cue a"), DjCommand::SetCue { deck: DeckId::A });
        assert_eq!(
            command("cue a 32.5"),
            DjCommand::AddCuePoint {
                deck: DeckId::A,
                position_seconds: 32.5
            }
        );
    }

    #[test]
    fn test_parse_load_keeps_spaces_in_path() {
        assert_eq!(
            command("load a /music/My Track.mp3"),
            DjCommand::Load {
                deck: DeckId::A,
                source: SourceRef::from("/music/My Track.mp3")
            }
        );
    }

    #[test]
    fn test_parse_other_actions_and_errors() {
        assert_eq!(parse_line(""), Ok(None));
        assert_eq!(parse_line("status"), Ok(Some(ConsoleAction::Status)));
        assert_eq!(parse_line("quit"), Ok(Some(ConsoleAction::Quit)));

        assert!(parse_line("play").is_err());
        assert!(parse_line("play ?").is_err());
        assert!(parse_line("volume a loud").is_err());
        assert!(parse_line("volume a").is_err());
        assert!(parse_line("load a").is_err());
        assert!(parse_line("scratch a").is_err());
    }

    #[test]
    fn test_describe_event() {
        let event = DjEvent::CuesChanged {
            deck: DeckId::A,
            cue_points: vec![10.0, 75.5],
            current_index: Some(1),
        };
        assert_eq!(
            describe_event(&event).as_deref(),
            Some("[A] cues 0:10.0 *1:15.5")
        );
        assert_eq!(
            describe_event(&DjEvent::PositionChanged {
                deck: DeckId::A,
                position_seconds: 1.0,
                relative: 0.1
            }),
            None
        );
    }

    #[test]
    fn test_format_snapshot() {
        let snapshot = DeckSnapshot {
            id: DeckId::B,
            state: DeckState::Playing,
            loaded: true,
            track_length_seconds: 200.0,
            position_seconds: 50.0,
            position_relative: 0.25,
            gain: 0.8,
            speed_ratio: 1.0,
            cue_points: vec![12.0],
            current_cue_index: None,
        };
        assert_eq!(
            format_snapshot(&snapshot),
            "[B] Playing  0:50.0 / 3:20.0 (25.0%)  volume 0.80  speed 1.00x  cues 1"
        );
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00.0");
        assert_eq!(format_time(61.26), "1:01.3");
        assert_eq!(format_time(-3.0), "0:00.0");
    }
}
