//! Error types for deck transport and loading.

use std::path::PathBuf;

use thiserror::Error;

use crate::deck::DeckId;
use crate::engine::StreamHandle;

/// A deck parameter that is validated against an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    Gain,
    SpeedRatio,
    RelativePosition,
    PositionSeconds,
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Gain => "gain",
            Self::SpeedRatio => "speed ratio",
            Self::RelativePosition => "relative position",
            Self::PositionSeconds => "position",
        };
        f.write_str(name)
    }
}

/// A value rejected because it lies outside its valid interval.
///
/// The previous value is always retained.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{parameter} {value} is outside the valid range {min}..={max}")]
pub struct RangeError {
    pub parameter: Parameter,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

impl RangeError {
    pub fn new(parameter: Parameter, value: f64, min: f64, max: f64) -> Self {
        Self {
            parameter,
            value,
            min,
            max,
        }
    }
}

/// Failure reported by an audio engine while decoding a source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("cannot read {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },
    #[error("unsupported audio format: {path}")]
    Unsupported { path: PathBuf },
    #[error("no audio track in {path}")]
    NoAudioTrack { path: PathBuf },
    #[error("cannot determine the length of {path}")]
    UnknownLength { path: PathBuf },
    #[error("audio engine failure: {0}")]
    Engine(String),
}

/// Failure of a transport call on an already decoded stream.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("unknown stream {0}")]
    UnknownStream(StreamHandle),
    #[error("seek to {position:.3}s failed: {reason}")]
    Seek { position: f64, reason: String },
    #[error("cannot reopen stream {stream}: {reason}")]
    Reopen { stream: StreamHandle, reason: String },
}

/// A load that did not produce a track.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// A newer load was issued for the same deck before this one finished.
    #[error("load superseded by a newer request")]
    Superseded,
}

/// Errors surfaced by deck operations.
///
/// None of these are fatal; they are logged at [`DeckError::level`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeckError {
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error("no track loaded")]
    NoTrackLoaded,
    #[error("cue list is empty")]
    EmptyCueList,
    #[error("deck {0} does not exist")]
    UnknownDeck(DeckId),
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl DeckError {
    /// Diagnostic level for this error.
    ///
    /// Routine UI states (no track, no cues) are debug noise; rejected
    /// values and failed loads are warnings.
    pub fn level(&self) -> log::Level {
        match self {
            Self::NoTrackLoaded | Self::EmptyCueList | Self::Load(LoadError::Superseded) => {
                log::Level::Debug
            }
            Self::Range(_) | Self::UnknownDeck(_) | Self::Load(_) => log::Level::Warn,
        }
    }
}

impl From<DecodeError> for DeckError {
    fn from(err: DecodeError) -> Self {
        Self::Load(LoadError::Decode(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        let range = DeckError::from(RangeError::new(Parameter::Gain, 1.5, 0.0, 1.0));
        assert_eq!(range.level(), log::Level::Warn);
        assert_eq!(DeckError::EmptyCueList.level(), log::Level::Debug);
        assert_eq!(DeckError::NoTrackLoaded.level(), log::Level::Debug);
        assert_eq!(
            DeckError::from(LoadError::Superseded).level(),
            log::Level::Debug
        );
        assert_eq!(
            DeckError::from(DecodeError::Engine("boom".into())).level(),
            log::Level::Warn
        );
    }

    #[test]
    fn test_range_error_message() {
        let err = RangeError::new(Parameter::SpeedRatio, 120.0, 0.0, 100.0);
        assert_eq!(
            err.to_string(),
            "speed ratio 120 is outside the valid range 0..=100"
        );
    }
}
