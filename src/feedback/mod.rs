// Audible feedback cues.

pub mod sounds;
pub use sounds::{SoundCue, SoundFeedback};
