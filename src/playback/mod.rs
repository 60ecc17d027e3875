//! Playback sequencing and the media collaborator boundary.

mod session;

pub use session::{Clip, Sequencer, SessionState, Step, CORRECTION_DURATION_MS};

use std::path::Path;

use anyhow::Result;

/// Completion notifications from the media collaborator. The token echoes
/// whatever was passed to [`MediaSink::play`]; the engine uses it to drop
/// completions from sessions it has already cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    Finished { token: u64 },
}

/// Boundary to whatever actually decodes and outputs audio.
///
/// Implementations report completion through the event channel they were
/// constructed with, not through these calls.
pub trait MediaSink: Send {
    fn play(&self, path: &Path, token: u64) -> Result<()>;
    fn stop(&self);
    fn set_volume(&self, volume: f32);
    fn set_muted(&self, muted: bool);
}
