//! Transport calls forwarded to the engine.
//!
//! Engine calls may block (a rodio seek waits for the mixer), so while the
//! module runs they execute in order on a dedicated worker thread and the
//! control task never waits on them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::mpsc;

use crate::deck::DeckId;
use crate::engine::{AudioEngine, StreamHandle};
use crate::error::EngineError;

/// A transport change for one stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportOp {
    Seek(f64),
    Play,
    Stop,
    SetGain(f64),
    SetSpeedRatio(f64),
    /// Drop the stream. Queued behind earlier calls for it.
    Release,
}

impl TransportOp {
    pub fn apply(self, engine: &dyn AudioEngine, stream: StreamHandle) -> Result<(), EngineError> {
        match self {
            Self::Seek(position_seconds) => engine.seek(stream, position_seconds),
            Self::Play => engine.play(stream),
            Self::Stop => engine.stop(stream),
            Self::SetGain(gain) => engine.set_gain(stream, gain),
            Self::SetSpeedRatio(ratio) => engine.set_speed_ratio(stream, ratio),
            Self::Release => {
                engine.release(stream);
                Ok(())
            }
        }
    }
}

/// One queued call. Holds a slot in its deck's pending counter until it
/// has run.
#[derive(Debug)]
pub struct TransportJob {
    deck: DeckId,
    stream: StreamHandle,
    op: TransportOp,
    pending: Arc<AtomicUsize>,
}

impl TransportJob {
    pub fn new(deck: DeckId, stream: StreamHandle, op: TransportOp, pending: &Arc<AtomicUsize>) -> Self {
        pending.fetch_add(1, Ordering::AcqRel);
        Self {
            deck,
            stream,
            op,
            pending: Arc::clone(pending),
        }
    }

    pub fn run(self, engine: &dyn AudioEngine) {
        if let Err(e) = self.op.apply(engine, self.stream) {
            log::warn!("Deck {} engine call {:?} failed: {}", self.deck, self.op, e);
        }
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Thread executing transport jobs in submission order.
pub struct TransportWorker {
    engine: Arc<dyn AudioEngine>,
    tx: mpsc::UnboundedSender<TransportJob>,
    thread: JoinHandle<()>,
}

impl TransportWorker {
    pub fn spawn(engine: Arc<dyn AudioEngine>) -> std::io::Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<TransportJob>();
        let worker_engine = Arc::clone(&engine);
        let thread = std::thread::Builder::new()
            .name("otodecks-transport".to_string())
            .spawn(move || {
                log::debug!("Transport worker started");
                while let Some(job) = rx.blocking_recv() {
                    job.run(worker_engine.as_ref());
                }
                log::debug!("Transport worker stopped");
            })?;

        Ok(Self { engine, tx, thread })
    }

    /// Queue a job. If the worker is gone the job runs on the caller.
    pub fn submit(&self, job: TransportJob) {
        if let Err(mpsc::error::SendError(job)) = self.tx.send(job) {
            log::warn!("Transport worker stopped, running {:?} inline", job.op);
            job.run(self.engine.as_ref());
        }
    }

    /// Stop accepting jobs. The worker drains the queue and exits; join the
    /// returned handle to wait for it.
    pub fn finish(self) -> JoinHandle<()> {
        self.thread
    }
}
