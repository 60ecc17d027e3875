use serde::{Deserialize, Serialize};

/// One selectable utterance: an audio clip, its display text, and the
/// metadata the selector filters on. Entries are immutable once loaded; a
/// category reload replaces the whole list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceEntry {
    /// Unique within its category.
    pub id: String,
    pub filename: String,
    pub text: String,
    pub weight: u32,
    pub animation: String,
    pub duration_ms: u64,
    /// Free-text trigger tags, matched by substring containment.
    pub trigger: String,
    pub play_once_per_day: bool,
    /// 0 means no per-entry cooldown.
    pub cooldown_minutes: u32,
    /// -1 when this is not a time-announcement entry.
    pub hour: i32,
    pub minute: i32,
    pub is_error: bool,
    pub correction_text: String,
    pub correction_filename: String,
}

impl Default for VoiceEntry {
    fn default() -> Self {
        Self {
            id: String::new(),
            filename: String::new(),
            text: String::new(),
            weight: 10,
            animation: "Talking".into(),
            duration_ms: 2000,
            trigger: String::new(),
            play_once_per_day: false,
            cooldown_minutes: 0,
            hour: -1,
            minute: -1,
            is_error: false,
            correction_text: String::new(),
            correction_filename: String::new(),
        }
    }
}

impl VoiceEntry {
    pub fn matches_trigger(&self, tag: &str) -> bool {
        self.trigger.contains(tag)
    }

    pub fn matches_slot(&self, hour: u32, minute: u32) -> bool {
        self.hour == hour as i32 && self.minute == minute as i32
    }

    /// Error variants with a correction clip get the "wrong answer, then
    /// correction" playback flow.
    pub fn has_correction(&self) -> bool {
        self.is_error && !self.correction_filename.is_empty()
    }
}
