//! Deck control surface mapping.
//!
//! Each deck exposes the same set of controls: transport buttons, a file
//! picker, three sliders and the cue buttons. Front ends report what the
//! user touched as a [`ControlId`] plus a [`ControlInput`], and
//! [`ControlMap`] turns that into a [`DjCommand`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::deck::DeckId;
use crate::engine::SourceRef;
use crate::module::DjCommand;

/// A control on a deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlId {
    Play,
    Stop,
    Load,
    Eject,
    /// Gain slider, 0.0-1.0.
    Volume,
    /// Speed ratio slider.
    Speed,
    /// Position slider, 0.0-1.0.
    Position,
    SetCue,
    JumpCue,
    ClearCues,
}

impl ControlId {
    pub const ALL: [ControlId; 10] = [
        ControlId::Play,
        ControlId::Stop,
        ControlId::Load,
        ControlId::Eject,
        ControlId::Volume,
        ControlId::Speed,
        ControlId::Position,
        ControlId::SetCue,
        ControlId::JumpCue,
        ControlId::ClearCues,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Stop => "stop",
            Self::Load => "load",
            Self::Eject => "eject",
            Self::Volume => "volume",
            Self::Speed => "speed",
            Self::Position => "position",
            Self::SetCue => "cue",
            Self::JumpCue => "jump",
            Self::ClearCues => "clear",
        }
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "play" => Ok(Self::Play),
            "stop" | "pause" => Ok(Self::Stop),
            "load" => Ok(Self::Load),
            "eject" => Ok(Self::Eject),
            "volume" | "gain" => Ok(Self::Volume),
            "speed" => Ok(Self::Speed),
            "position" | "pos" => Ok(Self::Position),
            "cue" | "setcue" => Ok(Self::SetCue),
            "jump" | "jumpcue" => Ok(Self::JumpCue),
            "clear" | "clearcues" => Ok(Self::ClearCues),
            other => Err(format!("unknown control '{}'", other)),
        }
    }
}

/// What the user did with a control.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlInput {
    /// A button press.
    Press,
    /// A slider moved to a value.
    Value(f64),
    /// A file was chosen.
    File(PathBuf),
}

/// Maps control input to deck commands.
pub struct ControlMap;

impl ControlMap {
    /// Translate one control action into a command.
    ///
    /// Returns `None` when the input does not fit the control, e.g. a
    /// slider value sent to the play button.
    pub fn translate(deck: DeckId, control: ControlId, input: ControlInput) -> Option<DjCommand> {
        match (control, input) {
            (ControlId::Play, ControlInput::Press) => Some(DjCommand::Play { deck }),
            (ControlId::Stop, ControlInput::Press) => Some(DjCommand::Stop { deck }),
            (ControlId::Eject, ControlInput::Press) => Some(DjCommand::Eject { deck }),
            (ControlId::Load, ControlInput::File(path)) => Some(DjCommand::Load {
                deck,
                source: SourceRef::new(path),
            }),
            (ControlId::Volume, ControlInput::Value(gain)) => {
                Some(DjCommand::SetGain { deck, gain })
            }
            (ControlId::Speed, ControlInput::Value(ratio)) => {
                Some(DjCommand::SetSpeedRatio { deck, ratio })
            }
            (ControlId::Position, ControlInput::Value(position)) => {
                Some(DjCommand::SetPositionRelative { deck, position })
            }
            (ControlId::SetCue, ControlInput::Press) => Some(DjCommand::SetCue { deck }),
            (ControlId::SetCue, ControlInput::Value(position_seconds)) => {
                Some(DjCommand::AddCuePoint {
                    deck,
                    position_seconds,
                })
            }
            (ControlId::JumpCue, ControlInput::Press) => Some(DjCommand::JumpToNextCue { deck }),
            (ControlId::ClearCues, ControlInput::Press) => Some(DjCommand::ClearCues { deck }),
            _ => None,
        }
    }

}
