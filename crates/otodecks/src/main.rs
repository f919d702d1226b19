mod console;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use otodecks_core::{ConfigManager, ModuleHost, ModuleMessage, Settings};
use otodecks_dj::{
    AudioEngine, Deck, DeckId, DjCommand, DjConfig, DjEvent, DjModule, FormatRegistry,
    MemoryEngine, RodioEngine, SourceRef,
};
use parking_lot::RwLock;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::console::ConsoleAction;

type SharedDeck = Arc<RwLock<Deck>>;

/// Multi-deck DJ player with cue points.
#[derive(Parser, Debug)]
#[command(name = "otodecks")]
#[command(about = "Otodecks DJ player")]
struct Args {
    /// Configuration file (default: ~/.otodecks/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of decks, overriding the configuration
    #[arg(long)]
    decks: Option<usize>,

    /// Run without opening an audio device
    #[arg(long)]
    no_audio: bool,

    /// Tracks to load, one per deck starting with deck A
    tracks: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    let mut config = ConfigManager::new(Some(
        args.config
            .clone()
            .unwrap_or_else(ConfigManager::default_user_path),
    ));
    let loaded = config.load();
    let mut settings = loaded.as_ref().cloned().unwrap_or_default();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log_level.as_str()),
    )
    .init();

    match &loaded {
        Ok(_) => log::info!("Loaded configuration from {}", config.config_path().display()),
        Err(e) => log::warn!("{}; using default settings", e),
    }

    apply_overrides(&mut settings, &args);

    let registry = Arc::new(FormatRegistry::with_basic_formats());
    log::debug!("Supported formats: {}", registry.extensions().join(", "));
    // The output stream must outlive the engine feeding it.
    let (_output, engine) = open_engine(&settings, registry);

    let module = DjModule::new(engine, DjConfig::from_settings(&settings));
    let decks: Vec<SharedDeck> = module
        .deck_ids()
        .filter_map(|id| module.deck(id).cloned())
        .collect();

    let mut host = ModuleHost::start(module)
        .await
        .map_err(|e| anyhow::anyhow!("failed to start deck module: {}", e))?;
    let mut messages = host
        .take_message_receiver()
        .context("deck module message channel already taken")?;

    for (index, path) in args.tracks.into_iter().enumerate() {
        if index >= decks.len() {
            log::warn!("No deck left for {}", path.display());
            continue;
        }
        host.send(DjCommand::Load {
            deck: DeckId::new(index),
            source: SourceRef::new(path),
        })
        .await
        .map_err(anyhow::Error::msg)?;
    }

    println!("Otodecks ready with {} decks. Type 'help' for commands.", decks.len());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match console::parse_line(&line) {
                    Ok(Some(ConsoleAction::Command(command))) => {
                        host.send(command).await.map_err(anyhow::Error::msg)?;
                    }
                    Ok(Some(ConsoleAction::Status)) => {
                        for deck in &decks {
                            println!("{}", console::format_snapshot(&deck.read().snapshot()));
                        }
                    }
                    Ok(Some(ConsoleAction::Help)) => println!("{}", console::HELP),
                    Ok(Some(ConsoleAction::Quit)) => break,
                    Ok(None) => {}
                    Err(e) => println!("{}", e),
                }
            }
            message = messages.recv() => {
                match message {
                    Some(ModuleMessage::Event(event)) => {
                        if loaded.is_ok() {
                            remember_directory(&mut config, &event);
                        }
                        if let Some(line) = console::describe_event(&event) {
                            println!("{}", line);
                        }
                    }
                    Some(ModuleMessage::Status(status)) => log::info!("{}", status),
                    Some(ModuleMessage::Error(error)) => log::error!("{}", error),
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted");
                break;
            }
        }
    }

    host.shutdown().await;
    Ok(())
}

/// Apply command line overrides on top of the loaded settings.
///
/// A deck count outside the configurable range is clamped into it.
fn apply_overrides(settings: &mut Settings, args: &Args) {
    if let Some(decks) = args.decks {
        let (min, max) = ConfigManager::schema()
            .deck
            .deck_count
            .valid_range
            .unwrap_or((1, usize::MAX));
        let clamped = decks.clamp(min, max);
        if clamped != decks {
            log::warn!(
                "--decks {} is outside {}..={}, using {}",
                decks,
                min,
                max,
                clamped
            );
        }
        settings.deck_count = clamped;
    }
    if args.no_audio {
        settings.audio_enabled = false;
    }
}

/// Open the audio output, falling back to the silent engine if there is
/// no usable device.
fn open_engine(
    settings: &Settings,
    registry: Arc<FormatRegistry>,
) -> (Option<rodio::OutputStream>, Arc<dyn AudioEngine>) {
    if settings.audio_enabled {
        match RodioEngine::open_default(Arc::clone(&registry)) {
            Ok((stream, engine)) => return (Some(stream), Arc::new(engine)),
            Err(e) => log::error!("Audio output unavailable ({}), running silent", e),
        }
    } else {
        log::info!("Audio disabled, running silent");
    }
    (None, Arc::new(MemoryEngine::with_registry(registry)))
}

/// Store the directory of a freshly loaded track in the configuration.
fn remember_directory(config: &mut ConfigManager, event: &DjEvent) {
    let DjEvent::TrackLoaded { source, .. } = event else {
        return;
    };
    let Some(directory) = source
        .path()
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
    else {
        return;
    };
    if config.settings().last_directory.as_deref() == Some(directory) {
        return;
    }

    // Persist the file settings, not the command line overrides.
    let mut updated = config.settings().clone();
    updated.last_directory = Some(directory.to_path_buf());
    match config.update_settings(updated) {
        Ok(()) => log::debug!("Last directory is now {}", directory.display()),
        Err(e) => log::warn!("Could not save last directory: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overridden(argv: &[&str]) -> Settings {
        let args = Args::parse_from(std::iter::once("otodecks").chain(argv.iter().copied()));
        let mut settings = Settings::default();
        apply_overrides(&mut settings, &args);
        settings
    }

    #[test]
    fn test_deck_override_is_clamped_to_the_valid_range() {
        assert_eq!(overridden(&["--decks", "4"]).deck_count, 4);
        assert_eq!(overridden(&["--decks", "0"]).deck_count, 1);
        assert_eq!(overridden(&["--decks", "1000"]).deck_count, 8);

        let settings = overridden(&["--decks", "1000"]);
        assert!(ConfigManager::validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_no_overrides_keep_settings() {
        let settings = overridden(&["--no-audio", "a.wav"]);
        assert_eq!(settings.deck_count, Settings::default().deck_count);
        assert!(!settings.audio_enabled);
    }
}
