pub mod audio;
pub mod engine;
pub mod events;
pub mod library;
pub mod metrics;
pub mod playback;
pub mod settings;
pub mod utils;
pub mod watcher;
pub mod weather;

use std::path::PathBuf;

use anyhow::Result;
use tokio::sync::mpsc;

use audio::AudioEngineHandle;
use engine::{EngineController, EngineOptions};
use library::VoiceLibrary;
use metrics::SystemMetricSource;
use settings::SettingsStore;
use watcher::{SignalWatcher, WatcherConfig};
use weather::WttrSource;

/// Wire everything up from a settings file and run until interrupted.
pub async fn run(settings_path: PathBuf) -> Result<()> {
    let controller = start(settings_path)?;
    tokio::signal::ctrl_c().await?;
    log::info!("shutting down");
    controller.shutdown().await
}

/// Build the full engine: settings, library, audio thread, watcher, engine
/// task. Returns the controller the embedding shell talks to.
pub fn start(settings_path: PathBuf) -> Result<EngineController> {
    let settings_store = SettingsStore::new(settings_path)?;
    let settings = settings_store.get();

    let library = VoiceLibrary::load(&settings.assets_dir);

    let (media_tx, media_rx) = mpsc::unbounded_channel();
    let media = AudioEngineHandle::new(media_tx);

    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    let mut watcher = SignalWatcher::new();
    watcher.start(
        WatcherConfig::from_settings(&settings),
        Box::new(SystemMetricSource::new(settings.cpu_monitor_mode)),
        Box::new(WttrSource::new()),
        signal_tx,
    )?;

    Ok(engine::spawn(
        library,
        Box::new(media),
        media_rx,
        signal_rx,
        Some(watcher),
        EngineOptions {
            volume: settings.volume,
            muted: settings.mute,
        },
    ))
}
