//! Otodecks deck core
//!
//! Transport and cue-point model for independent playback decks driving an
//! external audio engine.
//!
//! # Features
//!
//! - Any number of decks (two by default), each with its own track
//! - Relative seeking, gain and speed ratio with range checking
//! - Ordered, deduplicated cue points with wrap-around jumping
//! - Background track loading where a newer load supersedes older ones
//! - Pluggable [`AudioEngine`]: rodio output or an in-memory engine

pub mod controls;
pub mod deck;
pub mod engine;
pub mod error;
pub mod module;

// Re-export main types
pub use controls::{ControlId, ControlInput, ControlMap};
pub use deck::{CueList, CueMarker, Deck, DeckId, DeckSnapshot, DeckState};
pub use engine::{
    AudioEngine, DecodedSource, FormatRegistry, MemoryEngine, RodioEngine, SourceRef,
    StreamHandle,
};
pub use error::{DecodeError, DeckError, EngineError, LoadError, Parameter, RangeError};
pub use module::{DjCommand, DjConfig, DjEvent, DjModule};
