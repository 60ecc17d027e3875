//! The cadence loop behind [`super::SignalWatcher`].
//!
//! One task, three timers: a randomized idle timer, a 30-second system check
//! (weather, metrics, fixed-time matching, each behind its own cooldown),
//! and whatever forced commands arrive in between. Failures degrade to "no
//! signal this cycle" — the next tick retries on its own.

use std::time::Duration;

use chrono::Local;
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::metrics::MetricSource;
use crate::weather::{is_good_weather, WeatherSource};

use super::fixed_time::FixedTimeMatcher;
use super::hysteresis::{ResourceHysteresis, ResourceLevel};
use super::{Signal, WatcherCommand, WatcherConfig};

const ENABLE_LOGS: bool = true;
use crate::{log_info, log_warn};

struct WatchState {
    quiet: bool,
    fixed: FixedTimeMatcher,
    hysteresis: ResourceHysteresis,
    last_weather_refresh: Option<Instant>,
    last_metric_sample: Option<Instant>,
}

pub(super) async fn watch_loop(
    config: WatcherConfig,
    mut metrics: Box<dyn MetricSource>,
    weather: Box<dyn WeatherSource>,
    signals: mpsc::UnboundedSender<Signal>,
    mut commands: mpsc::UnboundedReceiver<WatcherCommand>,
    cancel: CancellationToken,
) {
    // First check lands a full interval out so the CPU usage baseline has
    // something to diff against.
    let mut check = interval_at(Instant::now() + config.check_interval, config.check_interval);
    check.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut state = WatchState {
        quiet: false,
        fixed: FixedTimeMatcher::new(config.slot_times.clone()),
        hysteresis: ResourceHysteresis::new(config.thresholds()),
        last_weather_refresh: None,
        last_metric_sample: None,
    };
    let mut idle_deadline = Instant::now() + random_idle_interval(&config);

    loop {
        tokio::select! {
            _ = sleep_until(idle_deadline) => {
                if !state.quiet {
                    send(&signals, Signal::Idle);
                }
                idle_deadline = Instant::now() + random_idle_interval(&config);
            }
            _ = check.tick() => {
                system_check(&config, &mut state, metrics.as_mut(), weather.as_ref(), &signals).await;
            }
            Some(command) = commands.recv() => match command {
                WatcherCommand::ForceIdle => {
                    // User-initiated: fires even during quiet hours, and
                    // re-arms the idle timer like any other fire.
                    send(&signals, Signal::Idle);
                    idle_deadline = Instant::now() + random_idle_interval(&config);
                }
                WatcherCommand::ForceWeather => {
                    refresh_weather(&config, &mut state, weather.as_ref(), &signals).await;
                }
            },
            _ = cancel.cancelled() => {
                log_info!("signal watcher shutting down");
                break;
            }
        }
    }
}

fn random_idle_interval(config: &WatcherConfig) -> Duration {
    let (min, max) = config.idle_range_secs;
    let secs = if max > min {
        rand::thread_rng().gen_range(min..=max)
    } else {
        min
    };
    Duration::from_secs(secs)
}

async fn system_check(
    config: &WatcherConfig,
    state: &mut WatchState,
    metrics: &mut dyn MetricSource,
    weather: &dyn WeatherSource,
    signals: &mpsc::UnboundedSender<Signal>,
) {
    let now = Instant::now();

    if state
        .last_weather_refresh
        .map_or(true, |at| now.duration_since(at) >= config.weather_refresh)
    {
        refresh_weather(config, state, weather, signals).await;
    }

    if config.monitor_enabled
        && state
            .last_metric_sample
            .map_or(true, |at| now.duration_since(at) >= config.metric_interval)
    {
        state.last_metric_sample = Some(now);
        match metrics.sample() {
            Some(value) => {
                if let Some(level) = state.hysteresis.observe(value, std::time::Instant::now()) {
                    send(
                        signals,
                        match level {
                            ResourceLevel::High => Signal::ResourceHigh,
                            ResourceLevel::Low => Signal::ResourceLow,
                        },
                    );
                }
            }
            // Keep the last classification; retry next cycle.
            None => log_warn!("metric sample unavailable, skipping this cycle"),
        }
    }

    let check = state.fixed.check(Local::now().naive_local(), state.quiet);
    if check.day_rollover {
        send(signals, Signal::DayRollover);
    }
    if let Some((hour, minute)) = check.hourly {
        send(signals, Signal::HourlyAnnounce { hour, minute });
    }
    for slot in check.slots {
        match slot {
            super::TimeSlot::Bedtime => state.quiet = true,
            super::TimeSlot::Wake => state.quiet = false,
            _ => {}
        }
        send(signals, Signal::TimeSlot(slot));
    }
}

async fn refresh_weather(
    config: &WatcherConfig,
    state: &mut WatchState,
    weather: &dyn WeatherSource,
    signals: &mpsc::UnboundedSender<Signal>,
) {
    // Stamp the attempt either way; a failed fetch waits out the full
    // refresh interval like a successful one.
    state.last_weather_refresh = Some(Instant::now());

    if config.weather_city.is_empty() {
        log_info!("no weather city configured, skipping refresh");
        return;
    }

    match weather.fetch(&config.weather_city).await {
        Ok(report) => {
            log_info!(
                "weather for {}: {} {:.0}°C",
                config.weather_city,
                report.condition_code,
                report.temperature
            );
            let good = is_good_weather(&report.condition_code);
            send(signals, Signal::WeatherUpdated(report));
            if good {
                send(signals, Signal::WeatherGood);
            }
        }
        Err(err) => log_warn!("weather refresh failed: {err:#}"),
    }
}

fn send(signals: &mpsc::UnboundedSender<Signal>, signal: Signal) {
    // The engine hanging up just means we are shutting down.
    let _ = signals.send(signal);
}
