//! The signal watcher: owns every ambient cadence and raises triggers.

mod fixed_time;
mod hysteresis;
mod loop_worker;

pub use fixed_time::{parse_slot_time, FixedTimeMatcher, SlotTimes, TimeCheck, TimeSlot};
pub use hysteresis::{
    ResourceHysteresis, ResourceLevel, Thresholds, TEMPERATURE_THRESHOLDS, USAGE_THRESHOLDS,
};

use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::metrics::{MetricSource, MonitorMode};
use crate::settings::Settings;
use crate::weather::{WeatherReport, WeatherSource};

use loop_worker::watch_loop;

/// A trigger raised by the watcher, consumed once by the engine.
#[derive(Debug, Clone)]
pub enum Signal {
    Idle,
    WeatherGood,
    WeatherUpdated(WeatherReport),
    ResourceHigh,
    ResourceLow,
    TimeSlot(TimeSlot),
    HourlyAnnounce { hour: u32, minute: u32 },
    DayRollover,
}

#[derive(Debug)]
enum WatcherCommand {
    ForceIdle,
    ForceWeather,
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub idle_range_secs: (u64, u64),
    pub check_interval: Duration,
    pub weather_refresh: Duration,
    pub metric_interval: Duration,
    pub weather_city: String,
    pub monitor_enabled: bool,
    pub monitor_mode: MonitorMode,
    pub slot_times: SlotTimes,
}

impl WatcherConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = SlotTimes::default();
        Self {
            idle_range_secs: (settings.idle_min_secs, settings.idle_max_secs),
            check_interval: Duration::from_secs(30),
            weather_refresh: Duration::from_secs(settings.weather_refresh_secs),
            metric_interval: Duration::from_secs(10),
            weather_city: settings.weather_city.clone(),
            monitor_enabled: settings.cpu_monitor_enabled,
            monitor_mode: settings.cpu_monitor_mode,
            slot_times: SlotTimes {
                morning: parse_slot_time(&settings.time_morning, defaults.morning),
                noon: parse_slot_time(&settings.time_noon, defaults.noon),
                sunset: parse_slot_time(&settings.time_sunset, defaults.sunset),
                night: parse_slot_time(&settings.time_night, defaults.night),
                bedtime: parse_slot_time(&settings.time_bedtime, defaults.bedtime),
                wake: parse_slot_time(&settings.time_wake, defaults.wake),
            },
        }
    }

    fn thresholds(&self) -> Thresholds {
        match self.monitor_mode {
            MonitorMode::Temp => TEMPERATURE_THRESHOLDS,
            MonitorMode::Usage => USAGE_THRESHOLDS,
        }
    }
}

pub struct SignalWatcher {
    handle: Option<JoinHandle<()>>,
    cancel: Option<CancellationToken>,
    commands: Option<mpsc::UnboundedSender<WatcherCommand>>,
}

impl SignalWatcher {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel: None,
            commands: None,
        }
    }

    pub fn start(
        &mut self,
        config: WatcherConfig,
        metrics: Box<dyn MetricSource>,
        weather: Box<dyn WeatherSource>,
        signals: mpsc::UnboundedSender<Signal>,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("watcher already active");
        }

        let cancel = CancellationToken::new();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(watch_loop(
            config,
            metrics,
            weather,
            signals,
            command_rx,
            cancel.clone(),
        ));

        self.handle = Some(handle);
        self.cancel = Some(cancel);
        self.commands = Some(command_tx);
        Ok(())
    }

    /// User-initiated "say something": fire the idle trigger now and re-arm
    /// the idle timer.
    pub fn force_idle(&self) {
        if let Some(commands) = &self.commands {
            let _ = commands.send(WatcherCommand::ForceIdle);
        }
    }

    /// Refresh weather immediately, bypassing the refresh cooldown.
    pub fn force_weather_refresh(&self) {
        if let Some(commands) = &self.commands {
            let _ = commands.send(WatcherCommand::ForceWeather);
        }
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.commands = None;

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("watcher loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for SignalWatcher {
    fn default() -> Self {
        Self::new()
    }
}
