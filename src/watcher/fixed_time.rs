//! Fixed-time matching: six configurable HH:MM slots that fire once per
//! calendar day, a top-of-hour announcement that fires once per hour, and
//! day-rollover detection. Pure state; the watcher loop feeds it the clock.

use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSlot {
    Morning,
    Noon,
    Sunset,
    Night,
    Bedtime,
    Wake,
}

impl TimeSlot {
    pub const ALL: [TimeSlot; 6] = [
        TimeSlot::Morning,
        TimeSlot::Noon,
        TimeSlot::Sunset,
        TimeSlot::Night,
        TimeSlot::Bedtime,
        TimeSlot::Wake,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TimeSlot::Morning => "morning",
            TimeSlot::Noon => "noon",
            TimeSlot::Sunset => "sunset",
            TimeSlot::Night => "night",
            TimeSlot::Bedtime => "bedtime",
            TimeSlot::Wake => "wake",
        }
    }

    fn index(self) -> usize {
        match self {
            TimeSlot::Morning => 0,
            TimeSlot::Noon => 1,
            TimeSlot::Sunset => 2,
            TimeSlot::Night => 3,
            TimeSlot::Bedtime => 4,
            TimeSlot::Wake => 5,
        }
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// Parse "HH:MM", falling back when the string is malformed.
pub fn parse_slot_time(value: &str, fallback: NaiveTime) -> NaiveTime {
    NaiveTime::parse_from_str(value, "%H:%M").unwrap_or(fallback)
}

#[derive(Debug, Clone)]
pub struct SlotTimes {
    pub morning: NaiveTime,
    pub noon: NaiveTime,
    pub sunset: NaiveTime,
    pub night: NaiveTime,
    pub bedtime: NaiveTime,
    pub wake: NaiveTime,
}

impl Default for SlotTimes {
    fn default() -> Self {
        Self {
            morning: hm(8, 0),
            noon: hm(12, 0),
            sunset: hm(18, 0),
            night: hm(22, 0),
            bedtime: hm(23, 0),
            wake: hm(7, 0),
        }
    }
}

impl SlotTimes {
    pub fn get(&self, slot: TimeSlot) -> NaiveTime {
        match slot {
            TimeSlot::Morning => self.morning,
            TimeSlot::Noon => self.noon,
            TimeSlot::Sunset => self.sunset,
            TimeSlot::Night => self.night,
            TimeSlot::Bedtime => self.bedtime,
            TimeSlot::Wake => self.wake,
        }
    }
}

/// Everything one clock check produced.
#[derive(Debug, Default, PartialEq)]
pub struct TimeCheck {
    pub slots: Vec<TimeSlot>,
    pub hourly: Option<(u32, u32)>,
    pub day_rollover: bool,
}

#[derive(Debug)]
pub struct FixedTimeMatcher {
    times: SlotTimes,
    /// Day-of-month each slot last fired on.
    last_fired_day: [Option<u32>; 6],
    last_hour_announced: Option<u32>,
    last_seen_day: Option<u32>,
}

impl FixedTimeMatcher {
    pub fn new(times: SlotTimes) -> Self {
        Self {
            times,
            last_fired_day: [None; 6],
            last_hour_announced: None,
            last_seen_day: None,
        }
    }

    /// Evaluate the clock. `quiet` suppresses only the hourly announcement;
    /// slot firings (including bedtime/wake themselves) always go through.
    pub fn check(&mut self, now: NaiveDateTime, quiet: bool) -> TimeCheck {
        let mut result = TimeCheck::default();
        let day = now.day();

        if let Some(previous) = self.last_seen_day {
            if previous != day {
                result.day_rollover = true;
            }
        }
        self.last_seen_day = Some(day);

        if now.minute() == 0 && !quiet && self.last_hour_announced != Some(now.hour()) {
            self.last_hour_announced = Some(now.hour());
            result.hourly = Some((now.hour(), now.minute()));
        }

        for slot in TimeSlot::ALL {
            let at = self.times.get(slot);
            if now.hour() == at.hour()
                && now.minute() == at.minute()
                && self.last_fired_day[slot.index()] != Some(day)
            {
                self.last_fired_day[slot.index()] = Some(day);
                result.slots.push(slot);
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn slot_fires_once_per_day() {
        let mut matcher = FixedTimeMatcher::new(SlotTimes::default());

        let first = matcher.check(at(10, 8, 0), false);
        assert!(first.slots.contains(&TimeSlot::Morning));

        // Same minute, next 30s tick: already fired today.
        let second = matcher.check(at(10, 8, 0), false);
        assert!(second.slots.is_empty());

        // Next day it fires again.
        let next_day = matcher.check(at(11, 8, 0), false);
        assert!(next_day.slots.contains(&TimeSlot::Morning));
    }

    #[test]
    fn hourly_announce_fires_once_per_hour() {
        let mut matcher = FixedTimeMatcher::new(SlotTimes::default());

        assert_eq!(matcher.check(at(10, 9, 0), false).hourly, Some((9, 0)));
        assert_eq!(matcher.check(at(10, 9, 0), false).hourly, None);
        assert_eq!(matcher.check(at(10, 9, 1), false).hourly, None);
        assert_eq!(matcher.check(at(10, 10, 0), false).hourly, Some((10, 0)));
    }

    #[test]
    fn quiet_suppresses_hourly_but_not_slots() {
        let mut times = SlotTimes::default();
        times.wake = hm(9, 0);
        let mut matcher = FixedTimeMatcher::new(times);

        let check = matcher.check(at(10, 9, 0), true);
        assert_eq!(check.hourly, None);
        assert!(check.slots.contains(&TimeSlot::Wake));
    }

    #[test]
    fn day_rollover_is_detected_once() {
        let mut matcher = FixedTimeMatcher::new(SlotTimes::default());

        assert!(!matcher.check(at(10, 23, 59), false).day_rollover);
        assert!(matcher.check(at(11, 0, 1), false).day_rollover);
        assert!(!matcher.check(at(11, 0, 2), false).day_rollover);
    }

    #[test]
    fn malformed_time_strings_fall_back() {
        assert_eq!(parse_slot_time("26:99", hm(8, 0)), hm(8, 0));
        assert_eq!(parse_slot_time("07:30", hm(8, 0)), hm(7, 30));
    }
}
