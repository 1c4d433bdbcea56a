// Pattern-based intent router for the known Russian voice commands.
// Rule order is significant: the first matching rule wins.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use super::{Intent, IntentKind};

/// What to pull out of a matching rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    None,
    /// Group 1 becomes `Intent::query`
    Query,
    /// Group 1 parses as an integer into params under "level"
    Level,
}

/// The command table. Patterns are anchored at the start of the
/// (lowercased, trimmed) transcript.
static PATTERNS: Lazy<Vec<(Regex, IntentKind, Capture)>> = Lazy::new(|| {
    [
        (
            r"^(?:включи|поставь|запусти)\s+(.+)",
            IntentKind::PlayMedia,
            Capture::Query,
        ),
        (r"^(?:пауза|стоп|останови)", IntentKind::Pause, Capture::None),
        (r"^(?:продолжи|играй|play)", IntentKind::Resume, Capture::None),
        (
            r"^(?:громче|прибавь звук)",
            IntentKind::VolumeUp,
            Capture::None,
        ),
        (
            r"^(?:тише|убавь звук)",
            IntentKind::VolumeDown,
            Capture::None,
        ),
        (
            r"^(?:громкость)\s+(\d+)",
            IntentKind::VolumeSet,
            Capture::Level,
        ),
        (
            r"^(?:выключи компьютер|shutdown)",
            IntentKind::Shutdown,
            Capture::None,
        ),
        (
            r"^(?:перезагрузи|перезагрузка)",
            IntentKind::Reboot,
            Capture::None,
        ),
        (
            r"^(?:на весь экран|фулскрин|fullscreen)",
            IntentKind::Fullscreen,
            Capture::None,
        ),
        (r"^(?:закрой|выйди)", IntentKind::Close, Capture::None),
        (
            r"^(?:следующ|дальше|next)",
            IntentKind::NextTrack,
            Capture::None,
        ),
        (
            r"^(?:предыдущ|назад|prev)",
            IntentKind::PrevTrack,
            Capture::None,
        ),
    ]
    .into_iter()
    .map(|(pattern, kind, capture)| (Regex::new(pattern).expect("valid pattern"), kind, capture))
    .collect()
});

/// Fast deterministic matcher; the decision depends only on the
/// lowercased, trimmed transcript.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexIntentRouter;

impl RegexIntentRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn route(&self, text: &str) -> Intent {
        let text = text.trim().to_lowercase();
        for (pattern, kind, capture) in PATTERNS.iter() {
            let Some(captures) = pattern.captures(&text) else {
                continue;
            };
            match capture {
                Capture::Query => {
                    if let Some(group) = captures.get(1) {
                        return Intent::with_query(*kind, group.as_str());
                    }
                }
                Capture::Level => {
                    // An unparseable number (absurdly long digit run)
                    // falls through rather than matching with no level
                    if let Ok(level) = captures[1].parse::<i64>() {
                        let mut intent = Intent::new(*kind);
                        intent.params.insert("level".to_string(), json!(level));
                        return intent;
                    }
                }
                Capture::None => return Intent::new(*kind),
            }
        }
        Intent::unknown(text)
    }
}

#[cfg(test)]
#[path = "regex_router_test.rs"]
mod tests;
