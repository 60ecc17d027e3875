//! Playback sequencing state machine.
//!
//! The sequencer holds no timers and touches no hardware — the caller feeds
//! it transitions (`clip_finished`, `delay_elapsed`, `clip_skipped`) and
//! executes the steps it returns. That keeps the "wrong answer, then
//! correction" and two-clip announcement flows fully deterministic and
//! testable without a clock.
//!
//! ```text
//! Idle -> Playing -> (AwaitingCorrection -> PlayingCorrection) -> Finished
//! Idle -> PlayingSequenceStep(0) -> AwaitingNextStep -> PlayingSequenceStep(1) -> Finished
//! ```

use std::time::Duration;

use crate::library::VoiceEntry;

/// Nominal duration used for correction clips, which carry no duration of
/// their own in the category files.
pub const CORRECTION_DURATION_MS: u64 = 2000;

/// One playable clip, detached from the library so a session survives a
/// category reload mid-playback.
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    /// `None` for correction clips: they share the original entry's id and
    /// must not refresh its cooldown state again.
    pub entry_id: Option<String>,
    pub filename: String,
    pub text: String,
    pub duration_ms: u64,
}

impl Clip {
    pub fn from_entry(entry: &VoiceEntry) -> Self {
        Self {
            entry_id: Some(entry.id.clone()),
            filename: entry.filename.clone(),
            text: entry.text.clone(),
            duration_ms: entry.duration_ms,
        }
    }

    pub fn correction_of(entry: &VoiceEntry) -> Option<Self> {
        if !entry.has_correction() {
            return None;
        }
        Some(Self {
            entry_id: None,
            filename: entry.correction_filename.clone(),
            text: entry.correction_text.clone(),
            duration_ms: CORRECTION_DURATION_MS,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Playing,
    AwaitingCorrection,
    PlayingCorrection,
    PlayingSequenceStep(usize),
    AwaitingNextStep,
    Finished,
}

/// What the caller must do next, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Surface text and duration to whoever renders the speech bubble.
    Announce { text: String, duration_ms: u64 },
    Play(Clip),
    Wait(Duration),
    Finish,
}

#[derive(Debug)]
pub struct Sequencer {
    state: SessionState,
    correction: Option<Clip>,
    next_clip: Option<Clip>,
    delay: Duration,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequencer {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            correction: None,
            next_clip: None,
            delay: Duration::ZERO,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, SessionState::Idle | SessionState::Finished)
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Single clip, with an optional delayed correction afterwards.
    pub fn begin_single(
        &mut self,
        clip: Clip,
        correction: Option<Clip>,
        delay: Duration,
    ) -> Vec<Step> {
        self.reset();
        self.state = SessionState::Playing;
        self.correction = correction;
        self.delay = delay;
        vec![
            Step::Announce {
                text: clip.text.clone(),
                duration_ms: clip.duration_ms,
            },
            Step::Play(clip),
        ]
    }

    /// Two-clip announcement: the combined text shows up front with the
    /// total duration (both clips plus the inter-clip delay).
    pub fn begin_pair(&mut self, first: Clip, second: Clip, delay: Duration) -> Vec<Step> {
        self.reset();
        self.state = SessionState::PlayingSequenceStep(0);
        let text = format!("{}{}", first.text, second.text);
        let duration_ms = first.duration_ms + second.duration_ms + delay.as_millis() as u64;
        self.next_clip = Some(second);
        self.delay = delay;
        vec![
            Step::Announce { text, duration_ms },
            Step::Play(first),
        ]
    }

    /// The media collaborator reported the current clip done.
    pub fn clip_finished(&mut self) -> Vec<Step> {
        match self.state {
            SessionState::Playing => {
                if self.correction.is_some() {
                    self.state = SessionState::AwaitingCorrection;
                    vec![Step::Wait(self.delay)]
                } else {
                    self.finish()
                }
            }
            SessionState::PlayingCorrection => self.finish(),
            SessionState::PlayingSequenceStep(0) => {
                self.state = SessionState::AwaitingNextStep;
                vec![Step::Wait(self.delay)]
            }
            SessionState::PlayingSequenceStep(_) => self.finish(),
            _ => Vec::new(),
        }
    }

    /// A scheduled inter-clip delay ran out.
    pub fn delay_elapsed(&mut self) -> Vec<Step> {
        match self.state {
            SessionState::AwaitingCorrection => match self.correction.take() {
                Some(clip) => {
                    self.state = SessionState::PlayingCorrection;
                    vec![
                        Step::Announce {
                            text: clip.text.clone(),
                            duration_ms: clip.duration_ms,
                        },
                        Step::Play(clip),
                    ]
                }
                None => self.finish(),
            },
            SessionState::AwaitingNextStep => match self.next_clip.take() {
                Some(clip) => {
                    self.state = SessionState::PlayingSequenceStep(1);
                    vec![Step::Play(clip)]
                }
                None => self.finish(),
            },
            _ => Vec::new(),
        }
    }

    /// The current clip's file is missing or unplayable: skip silently to
    /// whatever comes next rather than failing the session.
    pub fn clip_skipped(&mut self) -> Vec<Step> {
        match self.state {
            SessionState::PlayingSequenceStep(0) => match self.next_clip.take() {
                Some(clip) => {
                    self.state = SessionState::PlayingSequenceStep(1);
                    vec![Step::Play(clip)]
                }
                None => self.finish(),
            },
            SessionState::Playing
            | SessionState::PlayingCorrection
            | SessionState::PlayingSequenceStep(_) => self.finish(),
            _ => Vec::new(),
        }
    }

    fn finish(&mut self) -> Vec<Step> {
        self.state = SessionState::Finished;
        self.correction = None;
        self.next_clip = None;
        vec![Step::Finish]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(id: &str, text: &str, duration_ms: u64) -> Clip {
        Clip {
            entry_id: Some(id.into()),
            filename: format!("{id}.wav"),
            text: text.into(),
            duration_ms,
        }
    }

    #[test]
    fn single_clip_runs_to_finish() {
        let mut seq = Sequencer::new();
        let steps = seq.begin_single(clip("a", "你好", 1800), None, Duration::from_millis(1500));
        assert_eq!(
            steps,
            vec![
                Step::Announce {
                    text: "你好".into(),
                    duration_ms: 1800
                },
                Step::Play(clip("a", "你好", 1800)),
            ]
        );
        assert_eq!(seq.state(), SessionState::Playing);

        assert_eq!(seq.clip_finished(), vec![Step::Finish]);
        assert_eq!(seq.state(), SessionState::Finished);
    }

    #[test]
    fn error_clip_waits_then_plays_correction_once() {
        let mut seq = Sequencer::new();
        let correction = Clip {
            entry_id: None,
            filename: "fix.wav".into(),
            text: "说错了".into(),
            duration_ms: CORRECTION_DURATION_MS,
        };
        seq.begin_single(
            clip("wrong", "现在是三点", 2000),
            Some(correction.clone()),
            Duration::from_millis(1500),
        );

        assert_eq!(
            seq.clip_finished(),
            vec![Step::Wait(Duration::from_millis(1500))]
        );
        assert_eq!(seq.state(), SessionState::AwaitingCorrection);

        let steps = seq.delay_elapsed();
        assert_eq!(
            steps,
            vec![
                Step::Announce {
                    text: "说错了".into(),
                    duration_ms: CORRECTION_DURATION_MS
                },
                Step::Play(correction),
            ]
        );
        assert_eq!(seq.state(), SessionState::PlayingCorrection);

        // The correction plays exactly once per session.
        assert_eq!(seq.clip_finished(), vec![Step::Finish]);
    }

    #[test]
    fn pair_announces_combined_text_and_total_duration() {
        let mut seq = Sequencer::new();
        let first = clip("Mute-1", "诶？", 1200);
        let second = clip("Mute-2", "我很吵吗？", 1600);
        let steps = seq.begin_pair(first.clone(), second.clone(), Duration::from_millis(1500));

        assert_eq!(
            steps[0],
            Step::Announce {
                text: "诶？我很吵吗？".into(),
                duration_ms: 1200 + 1600 + 1500
            }
        );
        assert_eq!(steps[1], Step::Play(first));

        assert_eq!(
            seq.clip_finished(),
            vec![Step::Wait(Duration::from_millis(1500))]
        );
        assert_eq!(seq.delay_elapsed(), vec![Step::Play(second)]);
        assert_eq!(seq.clip_finished(), vec![Step::Finish]);
    }

    #[test]
    fn missing_first_pair_clip_skips_straight_to_second() {
        let mut seq = Sequencer::new();
        let second = clip("Mute-2", "我很吵吗？", 1600);
        seq.begin_pair(clip("Mute-1", "诶？", 1200), second.clone(), Duration::from_millis(1500));

        // No delay when the first clip never played.
        assert_eq!(seq.clip_skipped(), vec![Step::Play(second)]);
        assert_eq!(seq.clip_finished(), vec![Step::Finish]);
    }

    #[test]
    fn missing_second_pair_clip_still_finishes() {
        let mut seq = Sequencer::new();
        seq.begin_pair(
            clip("Mute-1", "诶？", 1200),
            clip("Mute-2", "我很吵吗？", 1600),
            Duration::from_millis(1500),
        );
        seq.clip_finished();
        seq.delay_elapsed();
        assert_eq!(seq.clip_skipped(), vec![Step::Finish]);
    }

    #[test]
    fn new_session_discards_in_flight_state() {
        let mut seq = Sequencer::new();
        seq.begin_pair(
            clip("a", "一", 1000),
            clip("b", "二", 1000),
            Duration::from_millis(500),
        );
        seq.clip_finished(); // AwaitingNextStep with a pending clip

        let steps = seq.begin_single(clip("c", "三", 1000), None, Duration::ZERO);
        assert_eq!(steps.len(), 2);
        assert_eq!(seq.state(), SessionState::Playing);
        // The old pair's pending clip is gone.
        assert_eq!(seq.clip_finished(), vec![Step::Finish]);
    }

    #[test]
    fn stale_transitions_are_ignored_when_idle() {
        let mut seq = Sequencer::new();
        assert!(seq.clip_finished().is_empty());
        assert!(seq.delay_elapsed().is_empty());
        assert!(seq.clip_skipped().is_empty());
    }
}
