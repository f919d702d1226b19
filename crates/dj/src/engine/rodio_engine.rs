//! Engine backed by rodio sinks on a shared output mixer.
//!
//! Each decoded stream gets its own [`Sink`], so gain, speed and transport
//! stay independent per deck while the mixer sums them to the output.
//! Speed changes are varispeed (pitch follows tempo).

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rodio::mixer::Mixer;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};

use super::{AudioEngine, DecodedSource, FormatRegistry, SourceRef, StreamHandle};
use crate::error::{DecodeError, EngineError};

/// A sink together with the source it plays, so a track that ran out can
/// be queued again.
struct RodioStream {
    sink: Sink,
    source: SourceRef,
}

/// Audio engine playing through rodio.
pub struct RodioEngine {
    mixer: Mixer,
    registry: Arc<FormatRegistry>,
    streams: Mutex<HashMap<StreamHandle, Arc<RodioStream>>>,
    next_handle: AtomicU64,
}

impl RodioEngine {
    /// Create an engine feeding `mixer`. The caller keeps the output stream
    /// that owns the mixer alive.
    pub fn new(mixer: Mixer, registry: Arc<FormatRegistry>) -> Self {
        Self {
            mixer,
            registry,
            streams: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Open the default output device.
    ///
    /// Audio stops when the returned [`OutputStream`] is dropped.
    pub fn open_default(
        registry: Arc<FormatRegistry>,
    ) -> Result<(OutputStream, Self), rodio::StreamError> {
        let stream = OutputStreamBuilder::open_default_stream()?;
        let engine = Self::new(stream.mixer().clone(), registry);
        log::info!("Opened default audio output");
        Ok((stream, engine))
    }

    /// Look up a stream. The map lock is released before the caller touches
    /// the sink, so a blocking seek never stalls position queries.
    fn stream(&self, stream: StreamHandle) -> Result<Arc<RodioStream>, EngineError> {
        self.streams
            .lock()
            .get(&stream)
            .cloned()
            .ok_or(EngineError::UnknownStream(stream))
    }

    /// Queue the track again if the sink played it to the end.
    fn refill(&self, handle: StreamHandle, stream: &RodioStream) -> Result<(), EngineError> {
        if !stream.sink.empty() {
            return Ok(());
        }
        let decoder = open_decoder(stream.source.path()).map_err(|e| EngineError::Reopen {
            stream: handle,
            reason: e.to_string(),
        })?;
        stream.sink.append(decoder);
        log::debug!("Requeued {} on stream {}", stream.source, handle);
        Ok(())
    }
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>, DecodeError> {
    let file = File::open(path).map_err(|e| DecodeError::Unreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Decoder::new(BufReader::new(file))
        .map_err(|e| DecodeError::Engine(format!("{}: {}", path.display(), e)))
}

impl AudioEngine for RodioEngine {
    fn name(&self) -> &'static str {
        "rodio"
    }

    fn decode(&self, source: &SourceRef) -> Result<DecodedSource, DecodeError> {
        let path = source.path();
        let probed = self.registry.probe(path)?;
        let decoder = open_decoder(path)?;

        let sink = Sink::connect_new(&self.mixer);
        sink.pause();
        sink.append(decoder);

        let handle = StreamHandle::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.streams.lock().insert(
            handle,
            Arc::new(RodioStream {
                sink,
                source: source.clone(),
            }),
        );

        log::debug!(
            "Decoded {} as stream {} ({:.2}s)",
            path.display(),
            handle,
            probed.length_seconds
        );

        Ok(DecodedSource {
            handle,
            length_seconds: probed.length_seconds,
        })
    }

    fn seek(&self, stream: StreamHandle, position_seconds: f64) -> Result<(), EngineError> {
        let entry = self.stream(stream)?;
        self.refill(stream, &entry)?;
        let target = Duration::from_secs_f64(position_seconds.max(0.0));
        entry.sink.try_seek(target).map_err(|e| EngineError::Seek {
            position: position_seconds,
            reason: e.to_string(),
        })
    }

    fn play(&self, stream: StreamHandle) -> Result<(), EngineError> {
        let entry = self.stream(stream)?;
        self.refill(stream, &entry)?;
        entry.sink.play();
        Ok(())
    }

    fn stop(&self, stream: StreamHandle) -> Result<(), EngineError> {
        self.stream(stream)?.sink.pause();
        Ok(())
    }

    fn set_gain(&self, stream: StreamHandle, gain: f64) -> Result<(), EngineError> {
        self.stream(stream)?.sink.set_volume(gain as f32);
        Ok(())
    }

    fn set_speed_ratio(&self, stream: StreamHandle, ratio: f64) -> Result<(), EngineError> {
        self.stream(stream)?.sink.set_speed(ratio as f32);
        Ok(())
    }

    fn current_position_seconds(&self, stream: StreamHandle) -> f64 {
        self.stream(stream)
            .map(|s| s.sink.get_pos().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn is_playing(&self, stream: StreamHandle) -> bool {
        self.stream(stream)
            .is_ok_and(|s| !s.sink.is_paused() && !s.sink.empty())
    }

    fn release(&self, stream: StreamHandle) {
        if let Some(entry) = self.streams.lock().remove(&stream) {
            entry.sink.stop();
            log::debug!("Released stream {}", stream);
        }
    }
}
