use crate::deck::DeckId;
use crate::engine::SourceRef;
use crate::error::{DeckError, LoadError};

/// Commands accepted by the deck module.
#[derive(Debug, Clone, PartialEq)]
pub enum DjCommand {
    /// Decode a track in the background and load it when ready.
    Load { deck: DeckId, source: SourceRef },
    Eject { deck: DeckId },
    Play { deck: DeckId },
    /// Pause without rewinding.
    Stop { deck: DeckId },
    SetGain { deck: DeckId, gain: f64 },
    SetSpeedRatio { deck: DeckId, ratio: f64 },
    /// Seek to a fraction (0.0-1.0) of the track.
    SetPositionRelative { deck: DeckId, position: f64 },
    Seek { deck: DeckId, position_seconds: f64 },
    /// Add a cue point at the engine's current playhead.
    SetCue { deck: DeckId },
    AddCuePoint { deck: DeckId, position_seconds: f64 },
    ClearCues { deck: DeckId },
    JumpToNextCue { deck: DeckId },
}

impl DjCommand {
    /// The deck this command targets.
    pub fn deck(&self) -> DeckId {
        match self {
            Self::Load { deck, .. }
            | Self::Eject { deck }
            | Self::Play { deck }
            | Self::Stop { deck }
            | Self::SetGain { deck, .. }
            | Self::SetSpeedRatio { deck, .. }
            | Self::SetPositionRelative { deck, .. }
            | Self::Seek { deck, .. }
            | Self::SetCue { deck }
            | Self::AddCuePoint { deck, .. }
            | Self::ClearCues { deck }
            | Self::JumpToNextCue { deck } => *deck,
        }
    }
}

/// Notifications emitted by the deck module, one per logical change.
#[derive(Debug, Clone, PartialEq)]
pub enum DjEvent {
    TrackLoaded {
        deck: DeckId,
        source: SourceRef,
        length_seconds: f64,
    },
    LoadFailed {
        deck: DeckId,
        source: SourceRef,
        error: LoadError,
    },
    TrackEjected {
        deck: DeckId,
    },
    PositionChanged {
        deck: DeckId,
        position_seconds: f64,
        relative: f64,
    },
    CuesChanged {
        deck: DeckId,
        cue_points: Vec<f64>,
        current_index: Option<usize>,
    },
    GainChanged {
        deck: DeckId,
        gain: f64,
    },
    SpeedChanged {
        deck: DeckId,
        ratio: f64,
    },
    PlaybackChanged {
        deck: DeckId,
        playing: bool,
    },
    /// A command was rejected with a warning-level error.
    Warning {
        deck: DeckId,
        error: DeckError,
    },
}

impl DjEvent {
    pub fn deck(&self) -> DeckId {
        match self {
            Self::TrackLoaded { deck, .. }
            | Self::LoadFailed { deck, .. }
            | Self::TrackEjected { deck }
            | Self::PositionChanged { deck, .. }
            | Self::CuesChanged { deck, .. }
            | Self::GainChanged { deck, .. }
            | Self::SpeedChanged { deck, .. }
            | Self::PlaybackChanged { deck, .. }
            | Self::Warning { deck, .. } => *deck,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_deck() {
        let command = DjCommand::Load {
            deck: DeckId::B,
            source: SourceRef::from("a.wav"),
        };
        assert_eq!(command.deck(), DeckId::B);
        assert_eq!(DjCommand::SetCue { deck: DeckId::A }.deck(), DeckId::A);
    }
}
