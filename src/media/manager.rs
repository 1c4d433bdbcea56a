// Provider registry and delegation. At most one playback session is
// active at a time; the active provider is tracked by index, never as
// any kind of global.

use super::{MediaProvider, MediaResult};
use crate::{debug, info};

/// What came out of a play request.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayOutcome {
    /// A user-visible status message (started, not found, no providers)
    Status(String),
    /// Several candidates; disambiguation is the caller's job
    Ambiguous(Vec<MediaResult>),
}

/// Default number of search hits requested from a provider
const SEARCH_LIMIT: usize = 5;

pub struct MediaManager {
    /// Providers in registration order; the first one serves searches
    providers: Vec<Box<dyn MediaProvider>>,
    /// Index into `providers` of the one currently playing
    active: Option<usize>,
}

impl MediaManager {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            active: None,
        }
    }

    /// Register a provider. A provider with the same name replaces the
    /// existing entry in place.
    pub fn register(&mut self, provider: Box<dyn MediaProvider>) {
        info!("[media] provider registered: {}", provider.name());
        if let Some(slot) = self
            .providers
            .iter_mut()
            .find(|p| p.name() == provider.name())
        {
            *slot = provider;
        } else {
            self.providers.push(provider);
        }
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn has_active(&self) -> bool {
        self.active.is_some()
    }

    /// Search across providers and play the best result.
    pub fn play(&mut self, query: &str) -> PlayOutcome {
        if self.providers.is_empty() {
            return PlayOutcome::Status("Нет доступных провайдеров".to_string());
        }

        // For now: the first registered provider serves all searches
        let index = 0;
        let results = self.providers[index].search(query, SEARCH_LIMIT);
        debug!("[media] {} result(s) for {query:?}", results.len());

        if results.is_empty() {
            return PlayOutcome::Status(format!("Не нашёл «{query}»"));
        }
        if results.len() > 1 {
            return PlayOutcome::Ambiguous(results);
        }

        self.active = Some(index);
        PlayOutcome::Status(self.providers[index].play(&results[0]))
    }

    pub fn pause(&mut self) -> String {
        match self.active {
            Some(index) => self.providers[index].pause(),
            None => "Нет активного воспроизведения".to_string(),
        }
    }

    pub fn resume(&mut self) -> String {
        match self.active {
            Some(index) => self.providers[index].resume(),
            None => "Нет активного воспроизведения".to_string(),
        }
    }

    pub fn fullscreen(&mut self) -> String {
        match self.active {
            Some(index) => self.providers[index].fullscreen(),
            None => "Нет активного воспроизведения".to_string(),
        }
    }
}

impl Default for MediaManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
