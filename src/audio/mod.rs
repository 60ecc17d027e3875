//! Voice clip playback on a dedicated audio thread.
//!
//! rodio's output objects are not `Send`, so a named thread owns them and
//! takes commands over a channel. While a clip is playing the thread polls
//! the sink between commands and reports drain through the media event
//! channel; the rest of the engine never blocks on audio.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{
    mpsc::{self, Receiver, RecvTimeoutError, Sender},
    Arc, Mutex,
};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use rodio::{Decoder, OutputStream, Sink};
use tokio::sync::mpsc::UnboundedSender;

use crate::playback::{MediaEvent, MediaSink};

const ENABLE_LOGS: bool = true;
use crate::{log_error, log_warn};

const DRAIN_POLL: Duration = Duration::from_millis(100);

enum AudioCommand {
    PlayFile { path: PathBuf, token: u64 },
    Stop,
    SetVolume(f32),
    SetMuted(bool),
}

pub struct AudioEngineHandle {
    tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
    events: UnboundedSender<MediaEvent>,
}

impl AudioEngineHandle {
    pub fn new(events: UnboundedSender<MediaEvent>) -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
            events,
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|err| anyhow!("audio command channel poisoned: {err}"))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();
        let events = self.events.clone();

        // Dedicated thread holding the non-Send rodio objects.
        thread::Builder::new()
            .name("audio-engine".to_string())
            .spawn(move || audio_worker(rx, events))
            .map_err(|err| anyhow!("failed to spawn audio thread: {err}"))?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    fn send(&self, command: AudioCommand) {
        match self.ensure_thread() {
            Ok(tx) => {
                if tx.send(command).is_err() {
                    log_error!("audio thread is gone; dropping command");
                }
            }
            Err(err) => log_error!("audio thread unavailable: {err:#}"),
        }
    }
}

impl MediaSink for AudioEngineHandle {
    fn play(&self, path: &Path, token: u64) -> Result<()> {
        let tx = self.ensure_thread()?;
        tx.send(AudioCommand::PlayFile {
            path: path.to_path_buf(),
            token,
        })
        .map_err(|err| anyhow!("audio thread rejected play command: {err}"))
    }

    fn stop(&self) {
        // Don't spin up a thread just to stop nothing.
        if let Ok(guard) = self.tx.lock() {
            if let Some(tx) = guard.as_ref() {
                let _ = tx.send(AudioCommand::Stop);
            }
        }
    }

    fn set_volume(&self, volume: f32) {
        self.send(AudioCommand::SetVolume(volume));
    }

    fn set_muted(&self, muted: bool) {
        self.send(AudioCommand::SetMuted(muted));
    }
}

fn ensure_sink(stream: &mut Option<OutputStream>, sink: &mut Option<Sink>) -> Result<()> {
    if sink.is_none() {
        let (new_stream, handle) = OutputStream::try_default()
            .map_err(|err| anyhow!("failed to open audio output stream: {err}"))?;
        let new_sink =
            Sink::try_new(&handle).map_err(|err| anyhow!("failed to create audio sink: {err}"))?;
        *stream = Some(new_stream);
        *sink = Some(new_sink);
    }
    Ok(())
}

fn audio_worker(rx: Receiver<AudioCommand>, events: UnboundedSender<MediaEvent>) {
    let mut _stream: Option<OutputStream> = None;
    let mut sink: Option<Sink> = None;
    let mut current: Option<u64> = None;
    let mut volume: f32 = 1.0;
    let mut muted = false;

    loop {
        // Block indefinitely while idle; poll while a clip is draining so
        // completion gets noticed.
        let command = if current.is_some() {
            match rx.recv_timeout(DRAIN_POLL) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match rx.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            }
        };

        if let Some(command) = command {
            match command {
                AudioCommand::PlayFile { path, token } => {
                    if let Some(old) = sink.take() {
                        old.stop();
                    }
                    _stream = None;
                    current = None;

                    if let Err(err) = ensure_sink(&mut _stream, &mut sink) {
                        log_error!("{err:#}");
                        // Report completion anyway so sequences keep moving.
                        let _ = events.send(MediaEvent::Finished { token });
                        continue;
                    }

                    let source = File::open(&path)
                        .map_err(anyhow::Error::from)
                        .and_then(|file| {
                            Decoder::new(BufReader::new(file)).map_err(anyhow::Error::from)
                        });
                    match (source, sink.as_ref()) {
                        (Ok(source), Some(active)) => {
                            active.set_volume(if muted { 0.0 } else { volume });
                            active.append(source);
                            current = Some(token);
                        }
                        (Err(err), _) => {
                            log_warn!("could not decode {}: {err:#}", path.display());
                            let _ = events.send(MediaEvent::Finished { token });
                        }
                        (_, None) => {
                            let _ = events.send(MediaEvent::Finished { token });
                        }
                    }
                }
                AudioCommand::Stop => {
                    if let Some(old) = sink.take() {
                        old.stop();
                    }
                    _stream = None;
                    current = None;
                }
                AudioCommand::SetVolume(value) => {
                    volume = value.clamp(0.0, 1.0);
                    if !muted {
                        if let Some(active) = sink.as_ref() {
                            active.set_volume(volume);
                        }
                    }
                }
                AudioCommand::SetMuted(value) => {
                    muted = value;
                    if let Some(active) = sink.as_ref() {
                        active.set_volume(if muted { 0.0 } else { volume });
                    }
                }
            }
        }

        if let (Some(token), Some(active)) = (current, sink.as_ref()) {
            if active.empty() {
                current = None;
                let _ = events.send(MediaEvent::Finished { token });
            }
        }
    }
}
