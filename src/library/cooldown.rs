use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};

use super::entry::VoiceEntry;

/// How many distinct recently-played ids stay excluded from selection.
pub const RECENT_LIMIT: usize = 5;

/// Per-category anti-repeat bookkeeping: last-played timestamps, the
/// once-per-day set, and a bounded ring of recently played ids.
///
/// `played_today` is cleared only by [`CooldownStore::reset_daily`], never by
/// elapsed time.
#[derive(Debug, Default)]
pub struct CooldownStore {
    last_played: HashMap<String, DateTime<Utc>>,
    played_today: HashSet<String>,
    recent: VecDeque<String>,
}

impl CooldownStore {
    /// Full eligibility check: once-per-day, per-entry cooldown, and the
    /// recent-history exclusion.
    pub fn is_eligible(&self, entry: &VoiceEntry, now: DateTime<Utc>) -> bool {
        if entry.play_once_per_day && self.played_today.contains(&entry.id) {
            return false;
        }
        if entry.cooldown_minutes > 0 {
            if let Some(&last) = self.last_played.get(&entry.id) {
                if now.signed_duration_since(last)
                    < Duration::minutes(i64::from(entry.cooldown_minutes))
                {
                    return false;
                }
            }
        }
        !self.recent.iter().any(|id| id == &entry.id)
    }

    /// Relaxed pass: only the single most-recently-played id stays excluded
    /// and cooldowns are waived. Once-per-day still holds.
    pub fn is_eligible_relaxed(&self, entry: &VoiceEntry) -> bool {
        if entry.play_once_per_day && self.played_today.contains(&entry.id) {
            return false;
        }
        self.recent.back().map_or(true, |id| id != &entry.id)
    }

    pub fn mark_played(&mut self, entry: &VoiceEntry, now: DateTime<Utc>) {
        self.last_played.insert(entry.id.clone(), now);
        if entry.play_once_per_day {
            self.played_today.insert(entry.id.clone());
        }
        // A replayed id moves to the most-recent slot instead of duplicating.
        self.recent.retain(|id| id != &entry.id);
        self.recent.push_back(entry.id.clone());
        while self.recent.len() > RECENT_LIMIT {
            self.recent.pop_front();
        }
    }

    pub fn most_recent(&self) -> Option<&str> {
        self.recent.back().map(String::as_str)
    }

    pub fn recent_count(&self) -> usize {
        self.recent.len()
    }

    pub fn reset_daily(&mut self) {
        self.played_today.clear();
        self.recent.clear();
    }

    /// Drop state for ids that no longer exist (category reload).
    pub fn retain_ids(&mut self, keep: &HashSet<&str>) {
        self.last_played.retain(|id, _| keep.contains(id.as_str()));
        self.played_today.retain(|id| keep.contains(id.as_str()));
        self.recent.retain(|id| keep.contains(id.as_str()));
    }
}
