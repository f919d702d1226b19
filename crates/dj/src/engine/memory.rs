//! In-memory engine without audio output.
//!
//! Tracks transport state per stream and records every call, which makes it
//! the engine of choice for tests and for running without a sound device.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use super::{AudioEngine, DecodedSource, FormatRegistry, SourceRef, StreamHandle};
use crate::error::{DecodeError, EngineError};

/// A transport call received by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Decode(PathBuf),
    Seek(StreamHandle, f64),
    Play(StreamHandle),
    Stop(StreamHandle),
    SetGain(StreamHandle, f64),
    SetSpeedRatio(StreamHandle, f64),
    Release(StreamHandle),
}

/// State of one decoded stream.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryStream {
    pub source: SourceRef,
    pub length_seconds: f64,
    pub position_seconds: f64,
    pub gain: f64,
    pub speed_ratio: f64,
    pub playing: bool,
}

#[derive(Debug, Clone, Copy)]
struct RegisteredSource {
    length_seconds: f64,
    decode_delay: Option<Duration>,
}

/// Engine keeping all state in memory.
pub struct MemoryEngine {
    registry: Option<Arc<FormatRegistry>>,
    sources: RwLock<HashMap<PathBuf, RegisteredSource>>,
    streams: Mutex<HashMap<StreamHandle, MemoryStream>>,
    calls: Mutex<Vec<EngineCall>>,
    seek_delay: Mutex<Option<Duration>>,
    next_handle: AtomicU64,
}

impl MemoryEngine {
    /// Engine that only knows explicitly registered sources.
    pub fn new() -> Self {
        Self {
            registry: None,
            sources: RwLock::new(HashMap::new()),
            streams: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            seek_delay: Mutex::new(None),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Engine that probes unregistered files through `registry`.
    pub fn with_registry(registry: Arc<FormatRegistry>) -> Self {
        Self {
            registry: Some(registry),
            ..Self::new()
        }
    }

    /// Make `path` decodable with the given length.
    pub fn register_source(&self, path: impl Into<PathBuf>, length_seconds: f64) {
        self.sources.write().insert(
            path.into(),
            RegisteredSource {
                length_seconds,
                decode_delay: None,
            },
        );
    }

    /// Like [`register_source`](Self::register_source), but decoding blocks
    /// for `delay` first.
    pub fn register_slow_source(
        &self,
        path: impl Into<PathBuf>,
        length_seconds: f64,
        delay: Duration,
    ) {
        self.sources.write().insert(
            path.into(),
            RegisteredSource {
                length_seconds,
                decode_delay: Some(delay),
            },
        );
    }

    /// Make every following seek block for `delay`, the way a device
    /// waiting on its mixer does.
    pub fn set_seek_delay(&self, delay: Duration) {
        *self.seek_delay.lock() = Some(delay);
    }

    /// Move every playing stream forward by `seconds` of wall time.
    ///
    /// Streams stop when they reach their end.
    pub fn advance(&self, seconds: f64) {
        for stream in self.streams.lock().values_mut() {
            if !stream.playing {
                continue;
            }
            let next = stream.position_seconds + seconds * stream.speed_ratio;
            if next >= stream.length_seconds {
                stream.position_seconds = stream.length_seconds;
                stream.playing = false;
            } else {
                stream.position_seconds = next;
            }
        }
    }

    /// Snapshot of a live stream.
    pub fn stream(&self, handle: StreamHandle) -> Option<MemoryStream> {
        self.streams.lock().get(&handle).cloned()
    }

    /// Number of streams not yet released.
    pub fn stream_count(&self) -> usize {
        self.streams.lock().len()
    }

    /// Every call received so far, oldest first.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().push(call);
    }

    fn with_stream(
        &self,
        handle: StreamHandle,
        f: impl FnOnce(&mut MemoryStream),
    ) -> Result<(), EngineError> {
        let mut streams = self.streams.lock();
        let stream = streams
            .get_mut(&handle)
            .ok_or(EngineError::UnknownStream(handle))?;
        f(stream);
        Ok(())
    }

    fn resolve_length(&self, source: &SourceRef) -> Result<f64, DecodeError> {
        let registered = self.sources.read().get(source.path()).copied();
        if let Some(registered) = registered {
            if let Some(delay) = registered.decode_delay {
                std::thread::sleep(delay);
            }
            if !registered.length_seconds.is_finite() || registered.length_seconds <= 0.0 {
                return Err(DecodeError::UnknownLength {
                    path: source.path().to_path_buf(),
                });
            }
            return Ok(registered.length_seconds);
        }

        match &self.registry {
            Some(registry) => Ok(registry.probe(source.path())?.length_seconds),
            None => Err(DecodeError::Unreadable {
                path: source.path().to_path_buf(),
                reason: "source not registered".to_string(),
            }),
        }
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEngine for MemoryEngine {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn decode(&self, source: &SourceRef) -> Result<DecodedSource, DecodeError> {
        self.record(EngineCall::Decode(source.path().to_path_buf()));
        let length_seconds = self.resolve_length(source)?;

        let handle = StreamHandle::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.streams.lock().insert(
            handle,
            MemoryStream {
                source: source.clone(),
                length_seconds,
                position_seconds: 0.0,
                gain: 1.0,
                speed_ratio: 1.0,
                playing: false,
            },
        );

        Ok(DecodedSource {
            handle,
            length_seconds,
        })
    }

    fn seek(&self, stream: StreamHandle, position_seconds: f64) -> Result<(), EngineError> {
        self.record(EngineCall::Seek(stream, position_seconds));
        let delay = *self.seek_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.with_stream(stream, |s| {
            s.position_seconds = position_seconds.clamp(0.0, s.length_seconds);
        })
    }

    fn play(&self, stream: StreamHandle) -> Result<(), EngineError> {
        self.record(EngineCall::Play(stream));
        self.with_stream(stream, |s| s.playing = true)
    }

    fn stop(&self, stream: StreamHandle) -> Result<(), EngineError> {
        self.record(EngineCall::Stop(stream));
        self.with_stream(stream, |s| s.playing = false)
    }

    fn set_gain(&self, stream: StreamHandle, gain: f64) -> Result<(), EngineError> {
        self.record(EngineCall::SetGain(stream, gain));
        self.with_stream(stream, |s| s.gain = gain)
    }

    fn set_speed_ratio(&self, stream: StreamHandle, ratio: f64) -> Result<(), EngineError> {
        self.record(EngineCall::SetSpeedRatio(stream, ratio));
        self.with_stream(stream, |s| s.speed_ratio = ratio)
    }

    fn current_position_seconds(&self, stream: StreamHandle) -> f64 {
        self.streams
            .lock()
            .get(&stream)
            .map(|s| s.position_seconds)
            .unwrap_or(0.0)
    }

    fn is_playing(&self, stream: StreamHandle) -> bool {
        self.streams
            .lock()
            .get(&stream)
            .is_some_and(|s| s.playing)
    }

    fn release(&self, stream: StreamHandle) {
        self.record(EngineCall::Release(stream));
        self.streams.lock().remove(&stream);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_registered_source() {
        let engine = MemoryEngine::new();
        engine.register_source("/music/a.wav", 180.0);

        let decoded = engine.decode(&SourceRef::from("/music/a.wav")).unwrap();
        assert_eq!(decoded.length_seconds, 180.0);
        assert_eq!(engine.stream_count(), 1);

        let other = engine.decode(&SourceRef::from("/music/a.wav")).unwrap();
        assert_ne!(decoded.handle, other.handle);
    }

    #[test]
    fn test_decode_unknown_source_fails() {
        let engine = MemoryEngine::new();
        engine.register_source("/music/empty.wav", 0.0);

        assert!(matches!(
            engine.decode(&SourceRef::from("/music/missing.wav")),
            Err(DecodeError::Unreadable { .. })
        ));
        assert!(matches!(
            engine.decode(&SourceRef::from("/music/empty.wav")),
            Err(DecodeError::UnknownLength { .. })
        ));
        assert_eq!(engine.stream_count(), 0);
    }

    #[test]
    fn test_advance_respects_speed_and_end() {
        let engine = MemoryEngine::new();
        engine.register_source("a.wav", 10.0);
        let handle = engine.decode(&SourceRef::from("a.wav")).unwrap().handle;

        engine.advance(1.0);
        assert_eq!(engine.current_position_seconds(handle), 0.0);

        engine.play(handle).unwrap();
        engine.set_speed_ratio(handle, 2.0).unwrap();
        engine.advance(1.5);
        assert_eq!(engine.current_position_seconds(handle), 3.0);

        assert!(engine.is_playing(handle));

        engine.advance(10.0);
        let stream = engine.stream(handle).unwrap();
        assert_eq!(stream.position_seconds, 10.0);
        assert!(!stream.playing);
        assert!(!engine.is_playing(handle));
    }

    #[test]
    fn test_seek_delay_blocks_only_the_caller() {
        let engine = Arc::new(MemoryEngine::new());
        engine.register_source("a.wav", 10.0);
        let handle = engine.decode(&SourceRef::from("a.wav")).unwrap().handle;
        engine.set_seek_delay(Duration::from_millis(200));

        let seeking = {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.seek(handle, 4.0))
        };
        std::thread::sleep(Duration::from_millis(20));

        let started = std::time::Instant::now();
        assert_eq!(engine.current_position_seconds(handle), 0.0);
        assert!(started.elapsed() < Duration::from_millis(100));

        seeking.join().unwrap().unwrap();
        assert_eq!(engine.current_position_seconds(handle), 4.0);
    }

    #[test]
    fn test_calls_are_recorded_and_unknown_streams_rejected() {
        let engine = MemoryEngine::new();
        engine.register_source("a.wav", 10.0);
        let handle = engine.decode(&SourceRef::from("a.wav")).unwrap().handle;

        engine.seek(handle, 4.0).unwrap();
        engine.release(handle);
        assert_eq!(
            engine.play(handle),
            Err(EngineError::UnknownStream(handle))
        );
        assert_eq!(engine.current_position_seconds(handle), 0.0);

        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::Decode(PathBuf::from("a.wav")),
                EngineCall::Seek(handle, 4.0),
                EngineCall::Release(handle),
                EngineCall::Play(handle),
            ]
        );
    }
}
