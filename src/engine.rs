//! The companion engine: signals in, voice lines out.
//!
//! One task owns the voice library and the playback session, so selection,
//! cooldown bookkeeping, and category reloads can never interleave. Signals
//! arrive from the watcher, commands from the embedding shell, completions
//! from the media collaborator; a generation counter makes sure a cancelled
//! session's leftovers (pending delays, stale completions) are ignored.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use rand::thread_rng;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::events::{EngineEvent, EventBus};
use crate::library::{
    pick_random, pick_time_announcement, CategoryConfig, TimePick, VoiceEntry, VoiceLibrary,
};
use crate::playback::{Clip, MediaEvent, MediaSink, Sequencer, Step};
use crate::watcher::{Signal, SignalWatcher, TimeSlot};
use crate::weather::condition_label;

const ENABLE_LOGS: bool = true;
use crate::{log_error, log_info, log_warn};

/// How long the shutdown voice line gets before the engine exits anyway.
const SHUTDOWN_VOICE_TIMEOUT: Duration = Duration::from_secs(5);

const IDLE_CATEGORY: &str = "Idle";
const DOUBLE_CLICK_CATEGORY: &str = "DoubleClick";
const SYSTEM_CATEGORY: &str = "System";
const TIME_ANNOUNCE_CATEGORY: &str = "TimeAnnounce";

/// Commands accepted by a running engine.
#[derive(Debug)]
pub enum EngineCommand {
    /// Single tap: same as an idle fire.
    Tap,
    DoubleTap,
    /// Triple tap: the easter-egg entry when one exists.
    TripleTap,
    /// Fire the idle trigger now and re-arm its timer.
    ForceChat,
    /// Refresh weather now, bypassing the refresh cooldown.
    ForceWeatherRefresh,
    SetVolume(f32),
    /// Play the mute announcement sequence, then engage mute.
    Mute,
    /// Disengage mute, then play the unmute line.
    Unmute,
    /// Atomically swap a category's entries; cooldown state carries over by
    /// entry id.
    ReloadCategory {
        name: String,
        config: CategoryConfig,
    },
    ResetDaily,
    Shutdown,
}

#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub volume: f32,
    pub muted: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            volume: 0.8,
            muted: false,
        }
    }
}

/// Handle to a running engine.
pub struct EngineController {
    commands: mpsc::UnboundedSender<EngineCommand>,
    events: EventBus,
    handle: Option<JoinHandle<()>>,
}

impl EngineController {
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn command(&self, command: EngineCommand) {
        let _ = self.commands.send(command);
    }

    /// Request shutdown (the exit voice line plays first) and wait for the
    /// engine task to drain.
    pub async fn shutdown(mut self) -> Result<()> {
        let _ = self.commands.send(EngineCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            handle.await.context("engine task failed to join")?;
        }
        Ok(())
    }
}

/// Spawn the engine task. `watcher` is optional so tests can drive the
/// signal channel directly.
pub fn spawn(
    library: VoiceLibrary,
    media: Box<dyn MediaSink>,
    media_events: mpsc::UnboundedReceiver<MediaEvent>,
    signals: mpsc::UnboundedReceiver<Signal>,
    watcher: Option<SignalWatcher>,
    options: EngineOptions,
) -> EngineController {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let events = EventBus::new();

    let engine = Engine {
        library,
        media,
        events: events.clone(),
        sequencer: Sequencer::new(),
        signals,
        commands: command_rx,
        media_events,
        watcher,
        session_category: None,
        generation: 0,
        pending_delay: None,
        shutdown_deadline: None,
        shutting_down: false,
        mute_after_session: false,
        volume: options.volume,
        muted: options.muted,
    };

    let handle = tokio::spawn(engine.run());

    EngineController {
        commands: command_tx,
        events,
        handle: Some(handle),
    }
}

struct Engine {
    library: VoiceLibrary,
    media: Box<dyn MediaSink>,
    events: EventBus,
    sequencer: Sequencer,
    signals: mpsc::UnboundedReceiver<Signal>,
    commands: mpsc::UnboundedReceiver<EngineCommand>,
    media_events: mpsc::UnboundedReceiver<MediaEvent>,
    watcher: Option<SignalWatcher>,
    /// Category the in-flight session selects media from.
    session_category: Option<String>,
    /// Bumped whenever a session is cancelled or started; stale timers and
    /// completions carry an older value and get dropped.
    generation: u64,
    pending_delay: Option<(Instant, u64)>,
    shutdown_deadline: Option<Instant>,
    shutting_down: bool,
    /// Engage mute once the current session finishes (mute sequence).
    mute_after_session: bool,
    volume: f32,
    muted: bool,
}

impl Engine {
    async fn run(mut self) {
        self.media.set_volume(self.volume);
        self.media.set_muted(self.muted);
        self.play_trigger(SYSTEM_CATEGORY, "on_start");

        loop {
            let delay_at = self.pending_delay.map(|(at, _)| at);
            let shutdown_at = self.shutdown_deadline;

            tokio::select! {
                Some(signal) = self.signals.recv() => self.handle_signal(signal),
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command) {
                            break;
                        }
                    }
                    None => break,
                },
                Some(event) = self.media_events.recv() => self.handle_media_event(event),
                _ = sleep_until(delay_at.unwrap_or_else(Instant::now)), if delay_at.is_some() => {
                    self.handle_delay_elapsed();
                }
                _ = sleep_until(shutdown_at.unwrap_or_else(Instant::now)), if shutdown_at.is_some() => {
                    log_warn!("exit voice did not finish in time");
                    break;
                }
            }

            if self.shutting_down && !self.sequencer.is_active() {
                break;
            }
        }

        if let Some(mut watcher) = self.watcher.take() {
            if let Err(err) = watcher.stop().await {
                log_error!("watcher did not stop cleanly: {err:#}");
            }
        }
        self.media.stop();
    }

    fn handle_signal(&mut self, signal: Signal) {
        if self.shutting_down {
            return;
        }
        let at = Utc::now();
        match signal {
            Signal::Idle => {
                self.events.emit(EngineEvent::IdleTriggered { at });
                self.play_random(IDLE_CATEGORY);
            }
            Signal::WeatherGood => {
                self.events.emit(EngineEvent::WeatherGood { at });
                self.play_trigger(SYSTEM_CATEGORY, "weather_sunny");
            }
            Signal::WeatherUpdated(report) => {
                let label = condition_label(&report.condition_code)
                    .unwrap_or(&report.condition_code)
                    .to_string();
                self.events
                    .emit(EngineEvent::WeatherUpdated { report, label, at });
            }
            Signal::ResourceHigh => {
                self.events.emit(EngineEvent::ResourceHigh { at });
                self.play_trigger(SYSTEM_CATEGORY, "cpu_temp>65");
            }
            Signal::ResourceLow => {
                self.events.emit(EngineEvent::ResourceLow { at });
                self.play_trigger(SYSTEM_CATEGORY, "cpu_temp<35");
            }
            Signal::TimeSlot(slot) => {
                self.events.emit(EngineEvent::TimeSlot { slot, at });
                match slot {
                    TimeSlot::Morning => {
                        self.play_trigger(SYSTEM_CATEGORY, "time_morning");
                    }
                    TimeSlot::Noon => {
                        self.play_trigger(SYSTEM_CATEGORY, "time_noon");
                    }
                    TimeSlot::Sunset => {
                        self.play_trigger(SYSTEM_CATEGORY, "time_sunset");
                    }
                    TimeSlot::Night => {
                        self.play_trigger(SYSTEM_CATEGORY, "time_night");
                    }
                    // Quiet hours: no voice line, just the mute state.
                    TimeSlot::Bedtime => self.set_muted(true),
                    TimeSlot::Wake => self.set_muted(false),
                }
            }
            Signal::HourlyAnnounce { hour, minute } => {
                self.events
                    .emit(EngineEvent::HourlyAnnounce { hour, minute, at });
                self.play_time_announcement(hour, minute);
            }
            Signal::DayRollover => {
                log_info!("day rollover, resetting daily play state");
                self.library.reset_daily();
            }
        }
    }

    /// Returns true when the run loop should exit immediately.
    fn handle_command(&mut self, command: EngineCommand) -> bool {
        match command {
            EngineCommand::Tap => {
                self.play_random(IDLE_CATEGORY);
            }
            EngineCommand::DoubleTap => {
                self.play_random(DOUBLE_CLICK_CATEGORY);
            }
            EngineCommand::TripleTap => self.play_triple_tap(),
            EngineCommand::ForceChat => match &self.watcher {
                Some(watcher) => watcher.force_idle(),
                None => self.handle_signal(Signal::Idle),
            },
            EngineCommand::ForceWeatherRefresh => {
                if let Some(watcher) = &self.watcher {
                    watcher.force_weather_refresh();
                }
            }
            EngineCommand::SetVolume(volume) => {
                self.volume = volume.clamp(0.0, 1.0);
                self.media.set_volume(self.volume);
            }
            EngineCommand::Mute => self.begin_mute_sequence(),
            EngineCommand::Unmute => {
                self.set_muted(false);
                self.play_trigger(SYSTEM_CATEGORY, "mute_off");
            }
            EngineCommand::ReloadCategory { name, config } => {
                if self.library.reload_category(&name, config) {
                    log_info!("category {name} reloaded");
                } else {
                    log_warn!("cannot reload unknown category {name}");
                }
            }
            EngineCommand::ResetDaily => self.library.reset_daily(),
            EngineCommand::Shutdown => return self.begin_shutdown(),
        }
        false
    }

    fn handle_media_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::Finished { token } => {
                if token != self.generation {
                    return;
                }
                let steps = self.sequencer.clip_finished();
                self.run_steps(steps);
            }
        }
    }

    fn handle_delay_elapsed(&mut self) {
        let Some((_, generation)) = self.pending_delay.take() else {
            return;
        };
        if generation != self.generation {
            return;
        }
        let steps = self.sequencer.delay_elapsed();
        self.run_steps(steps);
    }

    fn play_random(&mut self, category: &str) -> bool {
        self.select_and_play(category, None)
    }

    fn play_trigger(&mut self, category: &str, tag: &str) -> bool {
        self.select_and_play(category, Some(tag))
    }

    fn select_and_play(&mut self, category_name: &str, tag: Option<&str>) -> bool {
        let now = Utc::now();
        let Some(category) = self.library.category(category_name) else {
            log_warn!("unknown category {category_name}");
            return false;
        };
        let picked = pick_random(category, tag, now, &mut thread_rng()).cloned();
        let Some(entry) = picked else {
            log_info!("no eligible entry in {category_name} for {tag:?}");
            return false;
        };
        self.start_single(category_name, entry)
    }

    fn play_triple_tap(&mut self) {
        let easter_egg = self
            .library
            .category(DOUBLE_CLICK_CATEGORY)
            .and_then(|category| {
                category
                    .entries()
                    .iter()
                    .find(|entry| entry.id.contains("triple"))
                    .cloned()
            });
        match easter_egg {
            Some(entry) => {
                self.start_single(DOUBLE_CLICK_CATEGORY, entry);
            }
            None => {
                self.play_random(DOUBLE_CLICK_CATEGORY);
            }
        }
    }

    fn play_time_announcement(&mut self, hour: u32, minute: u32) {
        let picked = {
            let Some(category) = self.library.category(TIME_ANNOUNCE_CATEGORY) else {
                return;
            };
            match pick_time_announcement(category, hour, minute, &mut thread_rng()) {
                None => None,
                Some(TimePick::Normal(entry)) => Some((entry.clone(), None)),
                Some(TimePick::ErrorPair(first, second)) => {
                    Some((first.clone(), Some(second.clone())))
                }
            }
        };
        match picked {
            None => log_info!("no announcement configured for {hour:02}:{minute:02}"),
            Some((entry, None)) => {
                self.start_single(TIME_ANNOUNCE_CATEGORY, entry);
            }
            Some((first, Some(second))) => {
                self.start_pair(TIME_ANNOUNCE_CATEGORY, first, second);
            }
        }
    }

    fn begin_mute_sequence(&mut self) {
        let mut entries: Vec<VoiceEntry> = self
            .library
            .category(SYSTEM_CATEGORY)
            .map(|category| {
                category
                    .entries_by_trigger("mute_on")
                    .into_iter()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        // Id order keeps the combined text reading the right way round.
        entries.sort_by(|a, b| a.id.cmp(&b.id));

        let started = match entries.len() {
            0 => false,
            1 => self.start_single(SYSTEM_CATEGORY, entries.remove(0)),
            _ => {
                let first = entries.remove(0);
                let second = entries.remove(0);
                self.start_pair(SYSTEM_CATEGORY, first, second)
            }
        };

        if started && self.sequencer.is_active() {
            self.mute_after_session = true;
        } else {
            // Nothing playable; engage mute right away.
            self.set_muted(true);
        }
    }

    /// Returns true when there is no exit voice and the loop can stop now.
    fn begin_shutdown(&mut self) -> bool {
        // The goodbye plays even when muted.
        self.media.set_muted(false);
        if self.play_trigger(SYSTEM_CATEGORY, "on_exit") {
            self.shutting_down = true;
            self.shutdown_deadline = Some(Instant::now() + SHUTDOWN_VOICE_TIMEOUT);
            false
        } else {
            true
        }
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.media.set_muted(muted);
    }

    fn start_single(&mut self, category_name: &str, entry: VoiceEntry) -> bool {
        let (path, delay) = {
            let Some(category) = self.library.category(category_name) else {
                return false;
            };
            (
                category.resolve_media(&entry.filename),
                Duration::from_millis(category.correction_delay_ms),
            )
        };
        if !path.exists() {
            log_warn!("media file missing: {}", path.display());
            return false;
        }

        let correction = Clip::correction_of(&entry);
        let clip = Clip::from_entry(&entry);

        self.cancel_session();
        self.session_category = Some(category_name.to_string());
        let steps = self.sequencer.begin_single(clip, correction, delay);
        self.run_steps(steps);
        true
    }

    fn start_pair(&mut self, category_name: &str, first: VoiceEntry, second: VoiceEntry) -> bool {
        let delay = {
            let Some(category) = self.library.category(category_name) else {
                return false;
            };
            Duration::from_millis(category.correction_delay_ms)
        };

        self.cancel_session();
        self.session_category = Some(category_name.to_string());
        let steps = self
            .sequencer
            .begin_pair(Clip::from_entry(&first), Clip::from_entry(&second), delay);
        self.run_steps(steps);
        true
    }

    /// Stop current media and invalidate pending timers before any new
    /// session state becomes observable. Newest request wins.
    fn cancel_session(&mut self) {
        self.media.stop();
        self.sequencer.reset();
        self.pending_delay = None;
        self.generation = self.generation.wrapping_add(1);
        self.session_category = None;
        self.mute_after_session = false;
    }

    fn run_steps(&mut self, steps: Vec<Step>) {
        let mut queue: VecDeque<Step> = steps.into();
        while let Some(step) = queue.pop_front() {
            match step {
                Step::Announce { text, duration_ms } => {
                    let category = self.session_category.clone().unwrap_or_default();
                    self.events.emit(EngineEvent::PlaybackStarted {
                        category,
                        text,
                        duration_ms,
                        at: Utc::now(),
                    });
                }
                Step::Play(clip) => {
                    let Some(path) = self.resolve_clip(&clip) else {
                        log_warn!("skipping missing clip {}", clip.filename);
                        queue = self.sequencer.clip_skipped().into();
                        continue;
                    };
                    // Marked only after the file is known to resolve.
                    if let Some(id) = &clip.entry_id {
                        if let Some(name) = self.session_category.clone() {
                            if let Some(category) = self.library.category_mut(&name) {
                                category.mark_played(id, Utc::now());
                            }
                        }
                    }
                    if let Err(err) = self.media.play(&path, self.generation) {
                        log_error!("media sink refused {}: {err:#}", path.display());
                        queue = self.sequencer.clip_skipped().into();
                    }
                }
                Step::Wait(delay) => {
                    self.pending_delay = Some((Instant::now() + delay, self.generation));
                }
                Step::Finish => {
                    self.session_category = None;
                    self.events
                        .emit(EngineEvent::PlaybackFinished { at: Utc::now() });
                    if self.mute_after_session {
                        self.mute_after_session = false;
                        self.set_muted(true);
                    }
                }
            }
        }
    }

    fn resolve_clip(&self, clip: &Clip) -> Option<PathBuf> {
        let category = self
            .session_category
            .as_deref()
            .and_then(|name| self.library.category(name))?;
        let path = category.resolve_media(&clip.filename);
        path.exists().then_some(path)
    }
}
