//! Audio engine seam.
//!
//! Decks never decode, resample or mix audio themselves. They hold an opaque
//! [`StreamHandle`] obtained from an [`AudioEngine`] and forward transport
//! changes to it.

mod memory;
mod registry;
mod rodio_engine;

use std::path::{Path, PathBuf};

pub use memory::{EngineCall, MemoryEngine, MemoryStream};
pub use registry::{FormatRegistry, ProbedFormat};
pub use rodio_engine::RodioEngine;

use crate::error::{DecodeError, EngineError};

/// Opaque reference to a decoded stream owned by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamHandle(u64);

impl StreamHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a track comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRef {
    path: PathBuf,
}

impl SourceRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl From<PathBuf> for SourceRef {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&str> for SourceRef {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl std::fmt::Display for SourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Result of a successful decode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedSource {
    pub handle: StreamHandle,
    pub length_seconds: f64,
}

/// Capability the deck core drives. Implementations must be safe to share
/// between the control task and blocking decode workers.
pub trait AudioEngine: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Open and decode a source. May take a long time; callers run it off
    /// the control task.
    fn decode(&self, source: &SourceRef) -> Result<DecodedSource, DecodeError>;

    fn seek(&self, stream: StreamHandle, position_seconds: f64) -> Result<(), EngineError>;

    fn play(&self, stream: StreamHandle) -> Result<(), EngineError>;

    /// Halt playback without rewinding.
    fn stop(&self, stream: StreamHandle) -> Result<(), EngineError>;

    fn set_gain(&self, stream: StreamHandle, gain: f64) -> Result<(), EngineError>;

    fn set_speed_ratio(&self, stream: StreamHandle, ratio: f64) -> Result<(), EngineError>;

    /// Current playhead of the stream, 0 for unknown streams.
    fn current_position_seconds(&self, stream: StreamHandle) -> f64;

    /// Whether the stream is producing sound. False once it has played to
    /// the end, and for unknown streams.
    fn is_playing(&self, stream: StreamHandle) -> bool;

    /// Drop a stream nothing refers to any more.
    fn release(&self, stream: StreamHandle);
}
