//! Deck module: owns the decks, dispatches commands and polls the engine.

mod command;
mod transport;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
pub use command::{DjCommand, DjEvent};
use otodecks_core::{AsyncModule, ModuleError, ModuleEvent, ModuleId, ModuleMessage, Settings};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::deck::{Deck, DeckId, DeckSnapshot};
use crate::engine::{AudioEngine, DecodedSource, SourceRef, StreamHandle};
use crate::error::{DecodeError, DeckError, LoadError};
use transport::{TransportJob, TransportOp, TransportWorker};

/// Deck module configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DjConfig {
    /// Number of independent decks.
    pub deck_count: usize,
    /// Interval between two playhead polls.
    pub poll_interval: Duration,
    /// Gain every deck starts with.
    pub default_gain: f64,
    /// Speed ratio every deck starts with.
    pub default_speed_ratio: f64,
}

impl DjConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            deck_count: settings.deck_count,
            poll_interval: settings.poll_interval(),
            default_gain: settings.default_gain,
            default_speed_ratio: settings.default_speed_ratio,
        }
    }
}

impl Default for DjConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// A load in flight. Only the ticket with the deck's latest generation may
/// be applied.
#[derive(Debug, Clone)]
pub struct LoadTicket {
    pub deck: DeckId,
    pub generation: u64,
    pub source: SourceRef,
}

/// A finished decode, waiting to be applied to its deck.
#[derive(Debug)]
pub struct LoadOutcome {
    pub ticket: LoadTicket,
    pub result: Result<DecodedSource, DecodeError>,
}

/// Deck module state.
pub struct DjModule {
    decks: Vec<Arc<RwLock<Deck>>>,
    engine: Arc<dyn AudioEngine>,
    config: DjConfig,
    /// Latest load generation per deck.
    load_generations: Vec<u64>,
    /// Last position reported per deck, for coalescing notifications.
    reported_positions: Vec<Option<f64>>,
    /// Engine calls queued or running per deck.
    pending_transport: Vec<Arc<AtomicUsize>>,
    /// Runs engine calls while the module is running; calls run inline
    /// otherwise.
    transport: Option<TransportWorker>,
    load_tx: mpsc::UnboundedSender<LoadOutcome>,
    load_rx: Option<mpsc::UnboundedReceiver<LoadOutcome>>,
}

impl DjModule {
    /// Create a module with `config.deck_count` empty decks sharing `engine`.
    pub fn new(engine: Arc<dyn AudioEngine>, config: DjConfig) -> Self {
        let deck_count = config.deck_count.max(1);
        let decks = (0..deck_count)
            .map(|i| {
                let mut deck = Deck::new(DeckId::new(i));
                if let Err(e) = deck.set_gain(config.default_gain) {
                    log::warn!("Ignoring default gain: {}", e);
                }
                if let Err(e) = deck.set_speed_ratio(config.default_speed_ratio) {
                    log::warn!("Ignoring default speed ratio: {}", e);
                }
                Arc::new(RwLock::new(deck))
            })
            .collect();
        let (load_tx, load_rx) = mpsc::unbounded_channel();

        Self {
            decks,
            engine,
            config,
            load_generations: vec![0; deck_count],
            reported_positions: vec![None; deck_count],
            pending_transport: (0..deck_count)
                .map(|_| Arc::new(AtomicUsize::new(0)))
                .collect(),
            transport: None,
            load_tx,
            load_rx: Some(load_rx),
        }
    }

    pub fn config(&self) -> &DjConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<dyn AudioEngine> {
        &self.engine
    }

    pub fn deck_count(&self) -> usize {
        self.decks.len()
    }

    pub fn deck_ids(&self) -> impl Iterator<Item = DeckId> {
        (0..self.decks.len()).map(DeckId::new)
    }

    /// Get a reference to a deck.
    pub fn deck(&self, id: DeckId) -> Option<&Arc<RwLock<Deck>>> {
        self.decks.get(id.index())
    }

    pub fn snapshots(&self) -> Vec<DeckSnapshot> {
        self.decks.iter().map(|d| d.read().snapshot()).collect()
    }

    /// Execute a command and return the resulting notifications.
    ///
    /// Rejected commands are logged; warnings are also returned as
    /// [`DjEvent::Warning`].
    pub fn handle_command(&mut self, command: DjCommand) -> Vec<DjEvent> {
        let deck = command.deck();
        match self.execute(command) {
            Ok(events) => events,
            Err(error) => self.report(deck, error).into_iter().collect(),
        }
    }

    fn execute(&mut self, command: DjCommand) -> Result<Vec<DjEvent>, DeckError> {
        match command {
            DjCommand::Load { deck, source } => self.start_load(deck, source),
            DjCommand::Eject { deck } => self.eject(deck),
            DjCommand::Play { deck } => {
                let stream = {
                    let mut d = self.slot(deck)?.write();
                    d.play()?;
                    d.stream()
                };
                self.forward(deck, stream, TransportOp::Play);
                log::info!("Deck {} playing", deck);
                Ok(vec![DjEvent::PlaybackChanged {
                    deck,
                    playing: true,
                }])
            }
            DjCommand::Stop { deck } => {
                let stream = {
                    let mut d = self.slot(deck)?.write();
                    d.stop()?;
                    d.stream()
                };
                self.forward(deck, stream, TransportOp::Stop);
                log::info!("Deck {} stopped", deck);
                Ok(vec![DjEvent::PlaybackChanged {
                    deck,
                    playing: false,
                }])
            }
            DjCommand::SetGain { deck, gain } => {
                let stream = {
                    let mut d = self.slot(deck)?.write();
                    d.set_gain(gain)?;
                    d.stream()
                };
                self.forward(deck, stream, TransportOp::SetGain(gain));
                log::debug!("Deck {} gain set to {:.2}", deck, gain);
                Ok(vec![DjEvent::GainChanged { deck, gain }])
            }
            DjCommand::SetSpeedRatio { deck, ratio } => {
                let stream = {
                    let mut d = self.slot(deck)?.write();
                    d.set_speed_ratio(ratio)?;
                    d.stream()
                };
                self.forward(deck, stream, TransportOp::SetSpeedRatio(ratio));
                log::debug!("Deck {} speed ratio set to {:.3}", deck, ratio);
                Ok(vec![DjEvent::SpeedChanged { deck, ratio }])
            }
            DjCommand::SetPositionRelative { deck, position } => {
                let (seconds, stream) = {
                    let mut d = self.slot(deck)?.write();
                    (d.set_position_relative(position)?, d.stream())
                };
                self.forward(deck, stream, TransportOp::Seek(seconds));
                Ok(self.position_event(deck).into_iter().collect())
            }
            DjCommand::Seek {
                deck,
                position_seconds,
            } => {
                let (seconds, stream) = {
                    let mut d = self.slot(deck)?.write();
                    (d.set_position_seconds(position_seconds)?, d.stream())
                };
                self.forward(deck, stream, TransportOp::Seek(seconds));
                Ok(self.position_event(deck).into_iter().collect())
            }
            DjCommand::SetCue { deck } => {
                let position = {
                    let d = self.slot(deck)?.read();
                    match d.stream() {
                        // A queued seek has not reached the engine yet.
                        Some(stream) if !self.transport_pending(deck) => {
                            self.engine.current_position_seconds(stream)
                        }
                        _ => d.position_seconds(),
                    }
                };
                self.add_cue(deck, position)
            }
            DjCommand::AddCuePoint {
                deck,
                position_seconds,
            } => self.add_cue(deck, position_seconds),
            DjCommand::ClearCues { deck } => {
                let mut d = self.slot(deck)?.write();
                if d.cues().is_empty() {
                    log::debug!("Deck {} has no cues to clear", deck);
                    return Ok(Vec::new());
                }
                d.clear_cue_points();
                log::info!("Deck {} cues cleared", deck);
                Ok(vec![cues_event(&d)])
            }
            DjCommand::JumpToNextCue { deck } => {
                let (target, stream, cues) = {
                    let mut d = self.slot(deck)?.write();
                    let target = d.jump_to_next_cue().ok_or(DeckError::EmptyCueList)?;
                    d.set_position_seconds(target)?;
                    (target, d.stream(), cues_event(&d))
                };
                self.forward(deck, stream, TransportOp::Seek(target));
                log::info!("Deck {} jumped to cue at {:.2}s", deck, target);

                let mut events = vec![cues];
                events.extend(self.position_event(deck));
                Ok(events)
            }
        }
    }

    fn add_cue(&mut self, deck: DeckId, position_seconds: f64) -> Result<Vec<DjEvent>, DeckError> {
        let mut d = self.slot(deck)?.write();
        if d.add_cue_point(position_seconds) {
            log::info!("Deck {} cue set at {:.2}s", deck, position_seconds);
            Ok(vec![cues_event(&d)])
        } else {
            log::debug!(
                "Deck {} cue at {:.2}s skipped (not positive or duplicate)",
                deck,
                position_seconds
            );
            Ok(Vec::new())
        }
    }

    fn eject(&mut self, deck: DeckId) -> Result<Vec<DjEvent>, DeckError> {
        let stream = self.slot(deck)?.write().eject();
        // An eject also cancels any load still in flight.
        self.load_generations[deck.index()] += 1;
        self.reported_positions[deck.index()] = None;
        self.forward(deck, stream, TransportOp::Stop);
        self.forward(deck, stream, TransportOp::Release);
        log::info!("Deck {} ejected", deck);
        Ok(vec![DjEvent::TrackEjected { deck }])
    }

    fn start_load(&mut self, deck: DeckId, source: SourceRef) -> Result<Vec<DjEvent>, DeckError> {
        let ticket = self.begin_load(deck, source)?;
        log::info!(
            "Deck {} loading {} (generation {})",
            deck,
            ticket.source,
            ticket.generation
        );

        let engine = Arc::clone(&self.engine);
        let load_tx = self.load_tx.clone();
        tokio::task::spawn_blocking(move || {
            let result = engine.decode(&ticket.source);
            if load_tx.send(LoadOutcome { ticket, result }).is_err() {
                log::debug!("Load finished after the deck module stopped");
            }
        });
        Ok(Vec::new())
    }

    /// Register a new load for `deck`, superseding any load in flight.
    pub fn begin_load(&mut self, deck: DeckId, source: SourceRef) -> Result<LoadTicket, DeckError> {
        self.slot(deck)?;
        let generation = &mut self.load_generations[deck.index()];
        *generation += 1;
        Ok(LoadTicket {
            deck,
            generation: *generation,
            source,
        })
    }

    /// Apply a finished decode.
    ///
    /// Stale outcomes are dropped and their stream released. A successful
    /// outcome replaces the deck's track in a single write.
    pub fn finish_load(&mut self, outcome: LoadOutcome) -> Vec<DjEvent> {
        let LoadOutcome { ticket, result } = outcome;
        let deck = ticket.deck;

        let Some(&latest) = self.load_generations.get(deck.index()) else {
            return Vec::new();
        };
        if ticket.generation != latest {
            log::debug!(
                "Deck {} discarding {}: {}",
                deck,
                ticket.source,
                LoadError::Superseded
            );
            if let Ok(decoded) = result {
                self.engine.release(decoded.handle);
            }
            return Vec::new();
        }

        let decoded = match result {
            Ok(decoded) => decoded,
            Err(error) => {
                let error = LoadError::from(error);
                log::warn!("Deck {} failed to load {}: {}", deck, ticket.source, error);
                return vec![DjEvent::LoadFailed {
                    deck,
                    source: ticket.source,
                    error,
                }];
            }
        };

        let (previous, was_playing, gain, ratio, cues) = {
            let mut d = self.decks[deck.index()].write();
            let was_playing = d.state().is_playing();
            let previous = d.apply_load(ticket.source.clone(), decoded);
            (previous, was_playing, d.gain(), d.speed_ratio(), cues_event(&d))
        };

        self.forward(deck, previous, TransportOp::Stop);
        self.forward(deck, previous, TransportOp::Release);
        let stream = Some(decoded.handle);
        self.forward(deck, stream, TransportOp::SetGain(gain));
        self.forward(deck, stream, TransportOp::SetSpeedRatio(ratio));

        log::info!(
            "Deck {} loaded {} ({:.2}s)",
            deck,
            ticket.source,
            decoded.length_seconds
        );

        self.reported_positions[deck.index()] = None;
        let mut events = vec![DjEvent::TrackLoaded {
            deck,
            source: ticket.source,
            length_seconds: decoded.length_seconds,
        }];
        if was_playing {
            events.push(DjEvent::PlaybackChanged {
                deck,
                playing: false,
            });
        }
        events.push(cues);
        events.extend(self.position_event(deck));
        events
    }

    /// Decode and apply a load on the calling thread.
    pub fn load_now(&mut self, deck: DeckId, source: SourceRef) -> Vec<DjEvent> {
        match self.begin_load(deck, source) {
            Ok(ticket) => {
                let result = self.engine.decode(&ticket.source);
                self.finish_load(LoadOutcome { ticket, result })
            }
            Err(error) => self.report(deck, error).into_iter().collect(),
        }
    }

    /// Pull playheads from the engine. Emits at most one
    /// [`DjEvent::PositionChanged`] per deck, and only when it moved.
    ///
    /// A playing deck whose stream has run out is stopped and reports
    /// [`DjEvent::PlaybackChanged`] once. Decks with engine calls still in
    /// flight are skipped until the engine has caught up.
    pub fn poll(&mut self) -> Vec<DjEvent> {
        let mut events = Vec::new();
        for index in 0..self.decks.len() {
            let deck = DeckId::new(index);
            let (stream, playing) = {
                let d = self.decks[index].read();
                if !d.is_loaded() {
                    continue;
                }
                (d.stream(), d.state().is_playing())
            };
            if self.transport_pending(deck) {
                continue;
            }

            let mut ended = false;
            if let Some(stream) = stream {
                let position = self.engine.current_position_seconds(stream);
                let mut d = self.decks[index].write();
                d.sync_position(position);
                if playing
                    && (position >= d.track_length_seconds() || !self.engine.is_playing(stream))
                {
                    ended = d.stop().is_ok();
                }
            }
            events.extend(self.position_event(deck));

            if ended {
                self.forward(deck, stream, TransportOp::Stop);
                log::info!("Deck {} reached the end of the track", deck);
                events.push(DjEvent::PlaybackChanged {
                    deck,
                    playing: false,
                });
            }
        }
        events
    }

    fn transport_pending(&self, deck: DeckId) -> bool {
        self.pending_transport
            .get(deck.index())
            .is_some_and(|pending| pending.load(Ordering::Acquire) > 0)
    }

    fn slot(&self, deck: DeckId) -> Result<&Arc<RwLock<Deck>>, DeckError> {
        self.decks
            .get(deck.index())
            .ok_or(DeckError::UnknownDeck(deck))
    }

    fn position_event(&mut self, deck: DeckId) -> Option<DjEvent> {
        let (position_seconds, relative) = {
            let d = self.decks.get(deck.index())?.read();
            (d.position_seconds(), d.position_relative())
        };
        let reported = &mut self.reported_positions[deck.index()];
        if *reported == Some(position_seconds) {
            return None;
        }
        *reported = Some(position_seconds);
        Some(DjEvent::PositionChanged {
            deck,
            position_seconds,
            relative,
        })
    }

    /// Hand a transport call for `deck`'s stream to the engine.
    fn forward(&self, deck: DeckId, stream: Option<StreamHandle>, op: TransportOp) {
        let (Some(stream), Some(pending)) = (stream, self.pending_transport.get(deck.index()))
        else {
            return;
        };
        let job = TransportJob::new(deck, stream, op, pending);
        match &self.transport {
            Some(worker) => worker.submit(job),
            None => job.run(self.engine.as_ref()),
        }
    }

    fn report(&self, deck: DeckId, error: DeckError) -> Option<DjEvent> {
        let level = error.level();
        log::log!(level, "Deck {} rejected command: {}", deck, error);
        (level <= log::Level::Warn).then_some(DjEvent::Warning { deck, error })
    }
}

fn cues_event(deck: &Deck) -> DjEvent {
    DjEvent::CuesChanged {
        deck: deck.id(),
        cue_points: deck.cue_points().to_vec(),
        current_index: deck.current_cue_index(),
    }
}

#[async_trait]
impl AsyncModule for DjModule {
    type Command = DjCommand;
    type Event = DjEvent;

    fn id(&self) -> ModuleId {
        ModuleId("decks")
    }

    async fn initialize(&mut self) -> Result<(), ModuleError> {
        log::info!("Initializing deck module");
        log::info!("Audio engine: {}", self.engine.name());
        log::info!(
            "{} decks, polling every {:?}",
            self.decks.len(),
            self.config.poll_interval
        );
        let worker = TransportWorker::spawn(Arc::clone(&self.engine))
            .map_err(|e| format!("failed to start transport worker: {}", e))?;
        self.transport = Some(worker);
        Ok(())
    }

    async fn run(
        &mut self,
        mut rx: mpsc::Receiver<ModuleEvent<DjCommand>>,
        tx: mpsc::Sender<ModuleMessage<DjEvent>>,
    ) -> Result<(), ModuleError> {
        let mut load_rx = self
            .load_rx
            .take()
            .ok_or("deck module is already running")?;
        log::info!("Deck module running");

        let mut poll_interval = tokio::time::interval(self.config.poll_interval);
        poll_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let events = tokio::select! {
                event = rx.recv() => match event {
                    Some(ModuleEvent::Command(command)) => {
                        log::debug!("Deck module received command: {:?}", command);
                        self.handle_command(command)
                    }
                    Some(ModuleEvent::Shutdown) | None => {
                        log::info!("Deck module received shutdown");
                        break;
                    }
                },
                Some(outcome) = load_rx.recv() => self.finish_load(outcome),
                _ = poll_interval.tick() => self.poll(),
            };

            for event in events {
                if tx.send(ModuleMessage::Event(event)).await.is_err() {
                    log::debug!("Event receiver dropped");
                }
            }
        }

        self.load_rx = Some(load_rx);
        let _ = tx
            .send(ModuleMessage::Status("Deck module stopped".to_string()))
            .await;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), ModuleError> {
        log::info!("Shutting down deck module");
        if let Some(worker) = self.transport.take() {
            let thread = worker.finish();
            match tokio::task::spawn_blocking(move || thread.join()).await {
                Ok(Ok(())) => log::debug!("Transport worker joined"),
                _ => log::warn!("Transport worker did not stop cleanly"),
            }
        }
        for index in 0..self.decks.len() {
            let stream = self.decks[index].write().eject();
            self.forward(DeckId::new(index), stream, TransportOp::Stop);
            self.forward(DeckId::new(index), stream, TransportOp::Release);
        }
        log::info!("Deck module shutdown complete");
        Ok(())
    }

    fn status(&self) -> HashMap<String, String> {
        let mut status = HashMap::new();
        status.insert("engine".to_string(), self.engine.name().to_string());
        status.insert("decks".to_string(), self.decks.len().to_string());
        for snapshot in self.snapshots() {
            let prefix = format!("deck_{}", snapshot.id.to_string().to_lowercase());
            status.insert(format!("{}_state", prefix), format!("{:?}", snapshot.state));
            status.insert(
                format!("{}_position", prefix),
                format!("{:.3}", snapshot.position_relative),
            );
            status.insert(
                format!("{}_cues", prefix),
                snapshot.cue_points.len().to_string(),
            );
        }
        status
    }
}
