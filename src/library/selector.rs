//! Entry selection: weighted draws with cooldown filtering and the
//! probability-gated time-announcement error pair.

use chrono::{DateTime, Utc};
use rand::Rng;

use super::entry::VoiceEntry;
use super::VoiceCategory;

/// Result of a time-announcement lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimePick<'a> {
    Normal(&'a VoiceEntry),
    /// The easter egg pre-empts the normal announcement: wrong clip first,
    /// corrected clip second.
    ErrorPair(&'a VoiceEntry, &'a VoiceEntry),
}

/// Weighted random pick honoring the category's cooldown state.
///
/// When every entry is filtered out, a relaxation pass re-runs the filter
/// excluding only the most-recently-played id (and the once-per-day set).
/// Returns `None` when the category genuinely has nothing to offer; the
/// caller suppresses the trigger.
pub fn pick_random<'a>(
    category: &'a VoiceCategory,
    trigger: Option<&str>,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> Option<&'a VoiceEntry> {
    let tag_matches =
        |entry: &VoiceEntry| trigger.map_or(true, |tag| entry.matches_trigger(tag));
    let store = category.cooldown();

    let mut candidates: Vec<&VoiceEntry> = category
        .entries()
        .iter()
        .filter(|entry| tag_matches(entry) && store.is_eligible(entry, now))
        .collect();

    if candidates.is_empty() {
        candidates = category
            .entries()
            .iter()
            .filter(|entry| tag_matches(entry) && store.is_eligible_relaxed(entry))
            .collect();
    }

    weighted_draw(&candidates, rng)
}

fn weighted_draw<'a>(candidates: &[&'a VoiceEntry], rng: &mut impl Rng) -> Option<&'a VoiceEntry> {
    if candidates.is_empty() {
        return None;
    }
    let total: f64 = candidates.iter().map(|entry| f64::from(entry.weight)).sum();
    let target = rng.gen_range(0.0..=total);
    let mut cumulative = 0.0;
    for entry in candidates {
        cumulative += f64::from(entry.weight);
        if cumulative >= target {
            return Some(entry);
        }
    }
    // Float drift can leave the walk just short of `target`.
    candidates.last().copied()
}

/// Time-announcement pick for an exact slot. Normal entries draw uniformly
/// (unweighted); with probability `error_rate` the slot's error pair is
/// returned instead, when both halves exist.
pub fn pick_time_announcement<'a>(
    category: &'a VoiceCategory,
    hour: u32,
    minute: u32,
    rng: &mut impl Rng,
) -> Option<TimePick<'a>> {
    let normals: Vec<&VoiceEntry> = category
        .entries()
        .iter()
        .filter(|entry| entry.matches_slot(hour, minute) && !entry.is_error)
        .collect();
    if normals.is_empty() {
        return None;
    }

    if rng.gen::<f64>() < category.error_rate {
        let mut errors: Vec<&VoiceEntry> = category
            .entries()
            .iter()
            .filter(|entry| entry.matches_slot(hour, minute) && entry.is_error)
            .collect();
        errors.sort_by(|a, b| a.id.cmp(&b.id));
        if errors.len() >= 2 {
            return Some(TimePick::ErrorPair(errors[0], errors[1]));
        }
    }

    Some(TimePick::Normal(normals[rng.gen_range(0..normals.len())]))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::library::CategoryConfig;

    fn category(entries: Vec<VoiceEntry>) -> VoiceCategory {
        VoiceCategory::from_config(
            "Test",
            "/tmp/audio",
            CategoryConfig {
                entries,
                ..CategoryConfig::default()
            },
        )
    }

    fn entry(id: &str, weight: u32) -> VoiceEntry {
        VoiceEntry {
            id: id.into(),
            weight,
            ..VoiceEntry::default()
        }
    }

    #[test]
    fn draw_frequency_tracks_weights() {
        let cat = category(vec![entry("light", 10), entry("heavy", 30)]);
        let mut rng = StdRng::seed_from_u64(7);
        let now = Utc::now();

        let mut counts: HashMap<String, u32> = HashMap::new();
        for _ in 0..20_000 {
            let picked = pick_random(&cat, None, now, &mut rng).unwrap();
            *counts.entry(picked.id.clone()).or_default() += 1;
        }

        let heavy = f64::from(counts["heavy"]) / 20_000.0;
        // Expected 0.75; statistical, so allow a tolerance band.
        assert!((0.72..=0.78).contains(&heavy), "heavy ratio was {heavy}");
    }

    #[test]
    fn trigger_filter_narrows_candidates() {
        let mut morning = entry("morning", 10);
        morning.trigger = "time_morning".into();
        let mut night = entry("night", 10);
        night.trigger = "time_night".into();
        let cat = category(vec![morning, night]);
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..50 {
            let picked = pick_random(&cat, Some("time_morning"), Utc::now(), &mut rng).unwrap();
            assert_eq!(picked.id, "morning");
        }
    }

    #[test]
    fn recent_entries_are_excluded_until_relaxation() {
        let mut cat = category(vec![entry("a", 10), entry("b", 10)]);
        let now = Utc::now();
        cat.mark_played("a", now);

        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..20 {
            let picked = pick_random(&cat, None, now, &mut rng).unwrap();
            assert_eq!(picked.id, "b");
        }
    }

    #[test]
    fn relaxation_still_returns_something_with_two_entries() {
        // Both entries recently played: the strict pass is empty, the relaxed
        // pass excludes only the most recent id.
        let mut cat = category(vec![entry("a", 10), entry("b", 10)]);
        let now = Utc::now();
        cat.mark_played("a", now);
        cat.mark_played("b", now);

        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            let picked = pick_random(&cat, None, now, &mut rng).unwrap();
            assert_eq!(picked.id, "a");
        }
    }

    #[test]
    fn exhausted_category_declines() {
        let mut only = entry("only", 10);
        only.play_once_per_day = true;
        let mut cat = category(vec![only]);
        let now = Utc::now();
        cat.mark_played("only", now);

        let mut rng = StdRng::seed_from_u64(4);
        assert!(pick_random(&cat, None, now, &mut rng).is_none());
    }

    fn slot_entry(id: &str, is_error: bool) -> VoiceEntry {
        VoiceEntry {
            id: id.into(),
            hour: 8,
            minute: 0,
            is_error,
            ..VoiceEntry::default()
        }
    }

    #[test]
    fn certain_error_rate_always_returns_the_pair() {
        let mut cat = category(vec![
            slot_entry("Time-08-normal", false),
            slot_entry("Time-08-error_02", true),
            slot_entry("Time-08-error_01", true),
        ]);
        cat.error_rate = 1.0;

        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            match pick_time_announcement(&cat, 8, 0, &mut rng) {
                Some(TimePick::ErrorPair(first, second)) => {
                    assert_eq!(first.id, "Time-08-error_01");
                    assert_eq!(second.id, "Time-08-error_02");
                }
                other => panic!("expected the error pair, got {other:?}"),
            }
        }
    }

    #[test]
    fn zero_error_rate_never_returns_the_pair() {
        let cat = category(vec![
            slot_entry("Time-08-normal", false),
            slot_entry("Time-08-error_01", true),
            slot_entry("Time-08-error_02", true),
        ]);

        let mut rng = StdRng::seed_from_u64(6);
        for _ in 0..50 {
            assert!(matches!(
                pick_time_announcement(&cat, 8, 0, &mut rng),
                Some(TimePick::Normal(entry)) if entry.id == "Time-08-normal"
            ));
        }
    }

    #[test]
    fn incomplete_pair_falls_back_to_normal() {
        let mut cat = category(vec![
            slot_entry("Time-08-normal", false),
            slot_entry("Time-08-error_01", true),
        ]);
        cat.error_rate = 1.0;

        let mut rng = StdRng::seed_from_u64(8);
        assert!(matches!(
            pick_time_announcement(&cat, 8, 0, &mut rng),
            Some(TimePick::Normal(_))
        ));
    }

    #[test]
    fn unmatched_slot_returns_nothing() {
        let cat = category(vec![slot_entry("Time-08-normal", false)]);
        let mut rng = StdRng::seed_from_u64(9);
        assert!(pick_time_announcement(&cat, 9, 0, &mut rng).is_none());
    }
}
