//! Outward-facing events.
//!
//! Every externally observable occurrence produces one event on the
//! broadcast bus; the GUI shell, or anything else, subscribes and renders.
//! Delivery is at-most-once per occurrence — a slow subscriber that lags the
//! buffer loses old events rather than stalling the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::watcher::TimeSlot;
use crate::weather::WeatherReport;

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    IdleTriggered {
        at: DateTime<Utc>,
    },
    WeatherGood {
        at: DateTime<Utc>,
    },
    WeatherUpdated {
        report: WeatherReport,
        /// Mapped display label, or the raw condition code when unknown.
        label: String,
        at: DateTime<Utc>,
    },
    ResourceHigh {
        at: DateTime<Utc>,
    },
    ResourceLow {
        at: DateTime<Utc>,
    },
    TimeSlot {
        slot: TimeSlot,
        at: DateTime<Utc>,
    },
    HourlyAnnounce {
        hour: u32,
        minute: u32,
        at: DateTime<Utc>,
    },
    PlaybackStarted {
        category: String,
        text: String,
        duration_ms: u64,
        at: DateTime<Utc>,
    },
    PlaybackFinished {
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: EngineEvent) {
        // No subscribers is fine; the engine runs headless too.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
