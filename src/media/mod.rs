// Media playback: the provider capability contract and the registry
// that delegates to whichever provider is currently active.

pub mod manager;
pub use manager::{MediaManager, PlayOutcome};

/// One playable search hit. Opaque to the orchestrator; only providers
/// produce and consume these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaResult {
    pub title: String,
    pub url: String,
    /// Name of the provider that produced the result
    pub provider: String,
    pub thumbnail: String,
}

impl MediaResult {
    pub fn new(title: impl Into<String>, url: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            provider: provider.into(),
            thumbnail: String::new(),
        }
    }
}

/// Capability contract for a playback backend.
///
/// Concrete providers drive external players (a browser tab, a media
/// server); the orchestrator only ever sees this interface. Status
/// strings are user-visible messages.
pub trait MediaProvider: Send {
    fn name(&self) -> &str;

    /// Search for media matching the query.
    fn search(&mut self, query: &str, limit: usize) -> Vec<MediaResult>;

    /// Navigate to the result and start playback.
    fn play(&mut self, result: &MediaResult) -> String;

    fn pause(&mut self) -> String;

    fn resume(&mut self) -> String;

    fn fullscreen(&mut self) -> String;
}
