//! Deck transport state: playhead, track length, gain, speed and cue points.
//!
//! A [`Deck`] is pure state. It never talks to an audio engine except in
//! [`Deck::load`]; the module forwards accepted changes to the engine.

mod cue;

pub use cue::CueList;

use serde::{Deserialize, Serialize};

use crate::engine::{AudioEngine, DecodedSource, SourceRef, StreamHandle};
use crate::error::{DeckError, LoadError, Parameter, RangeError};

/// Valid gain interval (inclusive).
pub const GAIN_RANGE: (f64, f64) = (0.0, 1.0);
/// Valid speed ratio interval (lower bound exclusive).
pub const SPEED_RATIO_RANGE: (f64, f64) = (0.0, 100.0);

/// Deck identifier. Decks are numbered from zero and displayed as letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeckId(usize);

impl DeckId {
    pub const A: DeckId = DeckId(0);
    pub const B: DeckId = DeckId(1);

    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Get the deck as a numeric index.
    pub fn index(&self) -> usize {
        self.0
    }

    /// Parse a deck label: a letter (`A`, `b`) or a 1-based number (`1`).
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim();
        if let Ok(number) = label.parse::<usize>() {
            return number.checked_sub(1).map(Self);
        }
        let mut chars = label.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => {
                Some(Self((c.to_ascii_uppercase() as u8 - b'A') as usize))
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for DeckId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 < 26 {
            write!(f, "{}", (b'A' + self.0 as u8) as char)
        } else {
            write!(f, "{}", self.0 + 1)
        }
    }
}

/// Deck transport flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeckState {
    /// No track loaded.
    #[default]
    Empty,
    /// Track loaded, not playing.
    Stopped,
    /// Track is playing.
    Playing,
}

impl DeckState {
    /// Whether the deck is playing.
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }

    /// Whether a track is loaded, playing or not.
    pub fn has_track(&self) -> bool {
        !matches!(self, Self::Empty)
    }
}

/// Position of a cue point along the track, for drawing markers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CueMarker {
    /// Fraction of the track length, 0.0-1.0.
    pub relative: f64,
    /// Whether this is the cue last jumped to.
    pub active: bool,
}

/// Read-only copy of a deck for views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckSnapshot {
    pub id: DeckId,
    pub state: DeckState,
    pub loaded: bool,
    pub track_length_seconds: f64,
    pub position_seconds: f64,
    /// Playhead as a fraction of the track length.
    pub position_relative: f64,
    pub gain: f64,
    pub speed_ratio: f64,
    pub cue_points: Vec<f64>,
    pub current_cue_index: Option<usize>,
}

/// Complete deck state.
#[derive(Debug, Clone)]
pub struct Deck {
    /// Deck identifier
    id: DeckId,
    /// Transport state
    state: DeckState,
    /// Loaded track, if any
    source: Option<SourceRef>,
    /// Engine stream playing the loaded track
    stream: Option<StreamHandle>,
    /// Track length in seconds
    track_length_seconds: f64,
    /// Playhead in seconds
    position_seconds: f64,
    /// Output gain (0.0-1.0)
    gain: f64,
    /// Speed ratio (1.0 = normal)
    speed_ratio: f64,
    /// Cue points and jump cursor
    cues: CueList,
}

impl Deck {
    /// Create a new empty deck with unity gain and speed.
    pub fn new(id: DeckId) -> Self {
        Self {
            id,
            state: DeckState::Empty,
            source: None,
            stream: None,
            track_length_seconds: 0.0,
            position_seconds: 0.0,
            gain: 1.0,
            speed_ratio: 1.0,
            cues: CueList::new(),
        }
    }

    /// Which deck this is.
    pub fn id(&self) -> DeckId {
        self.id
    }

    /// Current transport state.
    pub fn state(&self) -> DeckState {
        self.state
    }

    /// Whether a track is loaded.
    pub fn is_loaded(&self) -> bool {
        self.state.has_track()
    }

    /// Source of the loaded track.
    pub fn source(&self) -> Option<&SourceRef> {
        self.source.as_ref()
    }

    /// Engine stream of the loaded track.
    pub fn stream(&self) -> Option<StreamHandle> {
        self.stream
    }

    /// Length of the loaded track in seconds, 0 when empty.
    pub fn track_length_seconds(&self) -> f64 {
        self.track_length_seconds
    }

    /// Playhead in seconds.
    pub fn position_seconds(&self) -> f64 {
        self.position_seconds
    }

    /// Output gain, 0.0-1.0.
    pub fn gain(&self) -> f64 {
        self.gain
    }

    /// Playback speed ratio, 1.0 is normal speed.
    pub fn speed_ratio(&self) -> f64 {
        self.speed_ratio
    }

    /// Cue points with their jump cursor.
    pub fn cues(&self) -> &CueList {
        &self.cues
    }

    /// Cue positions in seconds, in insertion order.
    pub fn cue_points(&self) -> &[f64] {
        self.cues.as_slice()
    }

    /// Index of the cue last jumped to.
    pub fn current_cue_index(&self) -> Option<usize> {
        self.cues.current_index()
    }

    /// Decode `source` through `engine` and swap it in.
    ///
    /// On failure nothing changes. On success the previous stream is
    /// released and its handle is no longer referenced.
    pub fn load(
        &mut self,
        engine: &dyn AudioEngine,
        source: SourceRef,
    ) -> Result<f64, LoadError> {
        let decoded = engine.decode(&source)?;
        if let Some(previous) = self.apply_load(source, decoded) {
            engine.release(previous);
        }
        Ok(decoded.length_seconds)
    }

    /// Swap in an already decoded source in one step: cues, cursor and
    /// playhead reset, gain and speed are kept.
    ///
    /// Returns the superseded stream, which the caller must release.
    pub fn apply_load(
        &mut self,
        source: SourceRef,
        decoded: DecodedSource,
    ) -> Option<StreamHandle> {
        let previous = self.stream.replace(decoded.handle);
        self.source = Some(source);
        self.track_length_seconds = decoded.length_seconds;
        self.position_seconds = 0.0;
        self.cues.clear();
        self.state = DeckState::Stopped;
        previous
    }

    /// Return to the empty state. Gain and speed are kept.
    ///
    /// Returns the stream that was loaded, if any.
    pub fn eject(&mut self) -> Option<StreamHandle> {
        self.state = DeckState::Empty;
        self.source = None;
        self.track_length_seconds = 0.0;
        self.position_seconds = 0.0;
        self.cues.clear();
        self.stream.take()
    }

    /// Playhead as a fraction of the track length, always within 0.0-1.0.
    pub fn position_relative(&self) -> f64 {
        if self.track_length_seconds > 0.0 && self.position_seconds >= 0.0 {
            let relative = self.position_seconds / self.track_length_seconds;
            if relative.is_nan() {
                0.0
            } else {
                relative.clamp(0.0, 1.0)
            }
        } else {
            0.0
        }
    }

    /// Move the playhead to `relative` of the track length.
    ///
    /// Returns the new position in seconds. Nothing changes when `relative`
    /// is outside 0.0-1.0 or no track is loaded.
    pub fn set_position_relative(&mut self, relative: f64) -> Result<f64, DeckError> {
        if !(0.0..=1.0).contains(&relative) {
            return Err(RangeError::new(Parameter::RelativePosition, relative, 0.0, 1.0).into());
        }
        if self.track_length_seconds <= 0.0 {
            return Err(DeckError::NoTrackLoaded);
        }
        self.position_seconds = relative * self.track_length_seconds;
        Ok(self.position_seconds)
    }

    /// Move the playhead to an absolute position within the track.
    pub fn set_position_seconds(&mut self, position_seconds: f64) -> Result<f64, DeckError> {
        if self.track_length_seconds <= 0.0 {
            return Err(DeckError::NoTrackLoaded);
        }
        if !(0.0..=self.track_length_seconds).contains(&position_seconds) {
            return Err(RangeError::new(
                Parameter::PositionSeconds,
                position_seconds,
                0.0,
                self.track_length_seconds,
            )
            .into());
        }
        self.position_seconds = position_seconds;
        Ok(self.position_seconds)
    }

    /// Adopt the playhead reported by the engine.
    ///
    /// Returns `true` if the stored position changed.
    pub fn sync_position(&mut self, engine_position_seconds: f64) -> bool {
        if self.track_length_seconds <= 0.0 {
            return false;
        }
        let relative = engine_position_seconds / self.track_length_seconds;
        let before = self.position_seconds;
        match self.set_position_relative(relative) {
            Ok(after) => after != before,
            Err(_) => false,
        }
    }

    /// Set the output gain. Values outside 0.0-1.0 are rejected.
    pub fn set_gain(&mut self, gain: f64) -> Result<(), RangeError> {
        let (min, max) = GAIN_RANGE;
        if !(min..=max).contains(&gain) {
            return Err(RangeError::new(Parameter::Gain, gain, min, max));
        }
        self.gain = gain;
        Ok(())
    }

    /// Set the speed ratio. Must be above 0 and at most 100.
    pub fn set_speed_ratio(&mut self, ratio: f64) -> Result<(), RangeError> {
        let (min, max) = SPEED_RATIO_RANGE;
        if ratio.is_nan() || ratio <= min || ratio > max {
            return Err(RangeError::new(Parameter::SpeedRatio, ratio, min, max));
        }
        self.speed_ratio = ratio;
        Ok(())
    }

    /// Mark the deck as playing. Requires a loaded track.
    pub fn play(&mut self) -> Result<(), DeckError> {
        if !self.is_loaded() {
            return Err(DeckError::NoTrackLoaded);
        }
        self.state = DeckState::Playing;
        Ok(())
    }

    /// Mark the deck as stopped. The playhead stays where it is.
    pub fn stop(&mut self) -> Result<(), DeckError> {
        if !self.is_loaded() {
            return Err(DeckError::NoTrackLoaded);
        }
        self.state = DeckState::Stopped;
        Ok(())
    }

    /// Add a cue point at `position_seconds`.
    ///
    /// Returns `false` for the silent no-op cases: a non-positive position
    /// or an exact duplicate. Any other value is appended, loaded or not.
    pub fn add_cue_point(&mut self, position_seconds: f64) -> bool {
        self.cues.add(position_seconds)
    }

    /// Remove every cue and reset the jump cursor.
    pub fn clear_cue_points(&mut self) {
        self.cues.clear();
    }

    /// Advance to the next cue, wrapping around, and return its position
    /// for the caller to seek to. The playhead itself is not moved.
    pub fn jump_to_next_cue(&mut self) -> Option<f64> {
        self.cues.jump_next()
    }

    /// Cue marker positions relative to the track length.
    pub fn cue_markers(&self) -> Vec<CueMarker> {
        if self.track_length_seconds <= 0.0 {
            return Vec::new();
        }
        let current = self.cues.current_index();
        self.cues
            .as_slice()
            .iter()
            .enumerate()
            .map(|(i, &p)| CueMarker {
                relative: (p / self.track_length_seconds).clamp(0.0, 1.0),
                active: current == Some(i),
            })
            .collect()
    }

    /// Copy the deck state for views.
    pub fn snapshot(&self) -> DeckSnapshot {
        DeckSnapshot {
            id: self.id,
            state: self.state,
            loaded: self.is_loaded(),
            track_length_seconds: self.track_length_seconds,
            position_seconds: self.position_seconds,
            position_relative: self.position_relative(),
            gain: self.gain,
            speed_ratio: self.speed_ratio,
            cue_points: self.cues.as_slice().to_vec(),
            current_cue_index: self.cues.current_index(),
        }
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new(DeckId::A)
    }
}
