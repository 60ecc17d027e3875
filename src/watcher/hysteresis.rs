//! Resource classification with re-raise cooldowns.
//!
//! A metric sample classifies into high/low/normal against fixed thresholds;
//! a level only raises a signal again after its cooldown so an oscillating
//! reading cannot spam triggers. Transitions into normal never raise.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceLevel {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classification {
    High,
    Low,
    Normal,
}

/// Threshold pair for one monitor mode.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub high: f32,
    pub low: f32,
}

pub const TEMPERATURE_THRESHOLDS: Thresholds = Thresholds {
    high: 80.0,
    low: 40.0,
};
pub const USAGE_THRESHOLDS: Thresholds = Thresholds {
    high: 80.0,
    low: 20.0,
};

const HIGH_RERAISE_COOLDOWN: Duration = Duration::from_secs(300);
const LOW_RERAISE_COOLDOWN: Duration = Duration::from_secs(600);

#[derive(Debug)]
pub struct ResourceHysteresis {
    thresholds: Thresholds,
    last_classification: Option<Classification>,
    last_high_raise: Option<Instant>,
    last_low_raise: Option<Instant>,
}

impl ResourceHysteresis {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            last_classification: None,
            last_high_raise: None,
            last_low_raise: None,
        }
    }

    /// Feed one sample; returns the level to signal, if any. The
    /// classification is retained either way so repeated samples at the same
    /// level stay quiet inside the cooldown window.
    pub fn observe(&mut self, value: f32, now: Instant) -> Option<ResourceLevel> {
        let classification = if value > self.thresholds.high {
            Classification::High
        } else if value < self.thresholds.low {
            Classification::Low
        } else {
            Classification::Normal
        };
        self.last_classification = Some(classification);

        match classification {
            Classification::High => {
                if cooldown_elapsed(self.last_high_raise, now, HIGH_RERAISE_COOLDOWN) {
                    self.last_high_raise = Some(now);
                    Some(ResourceLevel::High)
                } else {
                    None
                }
            }
            Classification::Low => {
                if cooldown_elapsed(self.last_low_raise, now, LOW_RERAISE_COOLDOWN) {
                    self.last_low_raise = Some(now);
                    Some(ResourceLevel::Low)
                } else {
                    None
                }
            }
            Classification::Normal => None,
        }
    }
}

fn cooldown_elapsed(last: Option<Instant>, now: Instant, cooldown: Duration) -> bool {
    last.map_or(true, |at| now.duration_since(at) >= cooldown)
}
