//! Deck module running inside a module host.

use std::sync::Arc;
use std::time::{Duration, Instant};

use otodecks_core::{ModuleHost, ModuleMessage};
use otodecks_dj::{
    AudioEngine, DeckId, DjCommand, DjConfig, DjEvent, DjModule, MemoryEngine, SourceRef,
};
use tokio::sync::mpsc;

type Host = ModuleHost<DjCommand, DjEvent>;

fn fast_config() -> DjConfig {
    let _ = env_logger::builder().is_test(true).try_init();
    DjConfig {
        poll_interval: Duration::from_millis(10),
        ..DjConfig::default()
    }
}

/// Wait for the first event matching `pred`, skipping everything else.
async fn wait_for(
    rx: &mut mpsc::Receiver<ModuleMessage<DjEvent>>,
    pred: impl Fn(&DjEvent) -> bool,
) -> DjEvent {
    let wait = async {
        loop {
            match rx.recv().await {
                Some(ModuleMessage::Event(event)) if pred(&event) => return event,
                Some(_) => continue,
                None => panic!("module stopped before the expected event"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("timed out waiting for event")
}

/// Wait until the engine reflects the calls queued so far.
async fn settle(check: impl Fn() -> bool) {
    let wait = async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("timed out waiting for the engine");
}

/// Collect every event that arrives within `window`.
async fn drain(rx: &mut mpsc::Receiver<ModuleMessage<DjEvent>>, window: Duration) -> Vec<DjEvent> {
    let mut events = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    while let Ok(Some(message)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        if let ModuleMessage::Event(event) = message {
            events.push(event);
        }
    }
    events
}

#[tokio::test]
async fn test_load_play_and_poll() {
    let engine = Arc::new(MemoryEngine::new());
    engine.register_source("a.wav", 100.0);

    let module = DjModule::new(engine.clone(), fast_config());
    let deck_a = module.deck(DeckId::A).cloned().unwrap();
    let mut host: Host = ModuleHost::start(module).await.unwrap();
    let mut rx = host.take_message_receiver().unwrap();

    host.send(DjCommand::Load {
        deck: DeckId::A,
        source: SourceRef::from("a.wav"),
    })
    .await
    .unwrap();
    let loaded = wait_for(&mut rx, |e| matches!(e, DjEvent::TrackLoaded { .. })).await;
    assert!(matches!(
        loaded,
        DjEvent::TrackLoaded { deck: DeckId::A, length_seconds, .. } if length_seconds == 100.0
    ));

    host.send(DjCommand::Play { deck: DeckId::A }).await.unwrap();
    wait_for(&mut rx, |e| {
        matches!(e, DjEvent::PlaybackChanged { playing: true, .. })
    })
    .await;
    let stream = deck_a.read().stream().unwrap();
    settle(|| engine.is_playing(stream)).await;

    engine.advance(25.0);
    let moved = wait_for(&mut rx, |e| matches!(e, DjEvent::PositionChanged { .. })).await;
    assert!(matches!(
        moved,
        DjEvent::PositionChanged { relative, .. } if (relative - 0.25).abs() < 1e-12
    ));
    assert_eq!(deck_a.read().position_seconds(), 25.0);

    host.shutdown().await;
    assert!(!host.is_running());
    assert_eq!(engine.stream_count(), 0);
}

#[tokio::test]
async fn test_newer_load_supersedes_slow_one() {
    let engine = Arc::new(MemoryEngine::new());
    engine.register_slow_source("slow.wav", 300.0, Duration::from_millis(300));
    engine.register_source("fast.wav", 60.0);

    let module = DjModule::new(engine.clone(), fast_config());
    let deck_a = module.deck(DeckId::A).cloned().unwrap();
    let mut host: Host = ModuleHost::start(module).await.unwrap();
    let mut rx = host.take_message_receiver().unwrap();

    host.send(DjCommand::Load {
        deck: DeckId::A,
        source: SourceRef::from("slow.wav"),
    })
    .await
    .unwrap();
    host.send(DjCommand::Load {
        deck: DeckId::A,
        source: SourceRef::from("fast.wav"),
    })
    .await
    .unwrap();

    let loaded = wait_for(&mut rx, |e| matches!(e, DjEvent::TrackLoaded { .. })).await;
    assert!(matches!(
        loaded,
        DjEvent::TrackLoaded { length_seconds, .. } if length_seconds == 60.0
    ));

    // Give the slow decode time to finish; its result must be dropped.
    let later = drain(&mut rx, Duration::from_millis(600)).await;
    assert!(!later
        .iter()
        .any(|e| matches!(e, DjEvent::TrackLoaded { .. })));
    assert_eq!(deck_a.read().track_length_seconds(), 60.0);
    assert_eq!(engine.stream_count(), 1);

    host.shutdown().await;
}

#[tokio::test]
async fn test_failed_load_reports_and_other_deck_unaffected() {
    let engine = Arc::new(MemoryEngine::new());
    engine.register_source("b.wav", 42.0);

    let module = DjModule::new(engine.clone(), fast_config());
    let mut host: Host = ModuleHost::start(module).await.unwrap();
    let mut rx = host.take_message_receiver().unwrap();

    host.send(DjCommand::Load {
        deck: DeckId::B,
        source: SourceRef::from("b.wav"),
    })
    .await
    .unwrap();
    host.send(DjCommand::Load {
        deck: DeckId::A,
        source: SourceRef::from("missing.wav"),
    })
    .await
    .unwrap();

    let mut failed = None;
    let mut loaded = None;
    while failed.is_none() || loaded.is_none() {
        let event = wait_for(&mut rx, |e| {
            matches!(e, DjEvent::LoadFailed { .. } | DjEvent::TrackLoaded { .. })
        })
        .await;
        match event {
            DjEvent::LoadFailed { .. } => failed = Some(event),
            _ => loaded = Some(event),
        }
    }
    assert_eq!(failed.map(|e| e.deck()), Some(DeckId::A));
    assert_eq!(loaded.map(|e| e.deck()), Some(DeckId::B));

    host.shutdown().await;
}

#[tokio::test]
async fn test_cue_workflow_through_host() {
    let engine = Arc::new(MemoryEngine::new());
    engine.register_source("a.wav", 100.0);

    let module = DjModule::new(engine.clone(), fast_config());
    let mut host: Host = ModuleHost::start(module).await.unwrap();
    let mut rx = host.take_message_receiver().unwrap();

    host.send(DjCommand::Load {
        deck: DeckId::A,
        source: SourceRef::from("a.wav"),
    })
    .await
    .unwrap();
    wait_for(&mut rx, |e| matches!(e, DjEvent::TrackLoaded { .. })).await;

    for position in [30.0, 10.0, 20.0] {
        host.send(DjCommand::AddCuePoint {
            deck: DeckId::A,
            position_seconds: position,
        })
        .await
        .unwrap();
    }
    let cues = wait_for(&mut rx, |e| {
        matches!(e, DjEvent::CuesChanged { cue_points, .. } if cue_points.len() == 3)
    })
    .await;
    assert!(matches!(
        cues,
        DjEvent::CuesChanged { ref cue_points, .. } if cue_points == &vec![30.0, 10.0, 20.0]
    ));

    host.send(DjCommand::JumpToNextCue { deck: DeckId::A })
        .await
        .unwrap();
    let jumped = wait_for(&mut rx, |e| matches!(e, DjEvent::PositionChanged { .. })).await;
    assert!(matches!(
        jumped,
        DjEvent::PositionChanged { position_seconds, .. } if position_seconds == 30.0
    ));

    host.shutdown().await;
}

#[tokio::test]
async fn test_slow_seek_does_not_hold_up_polling() {
    let engine = Arc::new(MemoryEngine::new());
    engine.register_source("a.wav", 100.0);
    engine.register_source("b.wav", 100.0);

    let module = DjModule::new(engine.clone(), fast_config());
    let deck_b = module.deck(DeckId::B).cloned().unwrap();
    let mut host: Host = ModuleHost::start(module).await.unwrap();
    let mut rx = host.take_message_receiver().unwrap();

    for (deck, path) in [(DeckId::A, "a.wav"), (DeckId::B, "b.wav")] {
        host.send(DjCommand::Load {
            deck,
            source: SourceRef::from(path),
        })
        .await
        .unwrap();
        wait_for(&mut rx, |e| matches!(e, DjEvent::TrackLoaded { .. })).await;
    }

    host.send(DjCommand::Play { deck: DeckId::B }).await.unwrap();
    let stream_b = deck_b.read().stream().unwrap();
    settle(|| engine.is_playing(stream_b)).await;

    engine.set_seek_delay(Duration::from_millis(800));
    let started = Instant::now();
    host.send(DjCommand::Seek {
        deck: DeckId::A,
        position_seconds: 50.0,
    })
    .await
    .unwrap();
    engine.advance(5.0);

    let moved = wait_for(&mut rx, |e| {
        matches!(
            e,
            DjEvent::PositionChanged { deck: DeckId::B, position_seconds, .. } if *position_seconds > 0.0
        )
    })
    .await;
    assert!(started.elapsed() < Duration::from_millis(400));
    assert!(matches!(
        moved,
        DjEvent::PositionChanged { position_seconds, .. } if position_seconds == 5.0
    ));

    host.shutdown().await;
}

#[tokio::test]
async fn test_track_end_through_host() {
    let engine = Arc::new(MemoryEngine::new());
    engine.register_source("a.wav", 10.0);

    let module = DjModule::new(engine.clone(), fast_config());
    let deck_a = module.deck(DeckId::A).cloned().unwrap();
    let mut host: Host = ModuleHost::start(module).await.unwrap();
    let mut rx = host.take_message_receiver().unwrap();

    host.send(DjCommand::Load {
        deck: DeckId::A,
        source: SourceRef::from("a.wav"),
    })
    .await
    .unwrap();
    wait_for(&mut rx, |e| matches!(e, DjEvent::TrackLoaded { .. })).await;

    host.send(DjCommand::Play { deck: DeckId::A }).await.unwrap();
    let stream = deck_a.read().stream().unwrap();
    settle(|| engine.is_playing(stream)).await;
    engine.advance(20.0);

    wait_for(&mut rx, |e| {
        matches!(e, DjEvent::PlaybackChanged { playing: false, .. })
    })
    .await;
    assert!(!deck_a.read().state().is_playing());
    assert_eq!(deck_a.read().position_relative(), 1.0);

    let later = drain(&mut rx, Duration::from_millis(100)).await;
    assert!(!later
        .iter()
        .any(|e| matches!(e, DjEvent::PlaybackChanged { .. })));

    host.shutdown().await;
}
