// Intent model: a closed set of command kinds plus free-form arguments.

use std::collections::HashMap;

use serde_json::Value;

/// Everything the assistant knows how to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentKind {
    PlayMedia,
    Pause,
    Resume,
    VolumeUp,
    VolumeDown,
    VolumeSet,
    Shutdown,
    Reboot,
    Fullscreen,
    Close,
    NextTrack,
    PrevTrack,
    Unknown,
}

impl IntentKind {
    pub const ALL: [IntentKind; 13] = [
        IntentKind::PlayMedia,
        IntentKind::Pause,
        IntentKind::Resume,
        IntentKind::VolumeUp,
        IntentKind::VolumeDown,
        IntentKind::VolumeSet,
        IntentKind::Shutdown,
        IntentKind::Reboot,
        IntentKind::Fullscreen,
        IntentKind::Close,
        IntentKind::NextTrack,
        IntentKind::PrevTrack,
        IntentKind::Unknown,
    ];

    /// Wire identifier, also used as the LLM tool function name.
    pub fn as_str(self) -> &'static str {
        match self {
            IntentKind::PlayMedia => "play_media",
            IntentKind::Pause => "pause",
            IntentKind::Resume => "resume",
            IntentKind::VolumeUp => "volume_up",
            IntentKind::VolumeDown => "volume_down",
            IntentKind::VolumeSet => "volume_set",
            IntentKind::Shutdown => "shutdown",
            IntentKind::Reboot => "reboot",
            IntentKind::Fullscreen => "fullscreen",
            IntentKind::Close => "close",
            IntentKind::NextTrack => "next_track",
            IntentKind::PrevTrack => "prev_track",
            IntentKind::Unknown => "unknown",
        }
    }

    /// Resolve a tool function name. `Unknown` is not addressable;
    /// unrecognized names collapse to `None`.
    pub fn from_tool_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .filter(|kind| *kind != IntentKind::Unknown)
            .find(|kind| kind.as_str() == name)
    }
}

/// A typed command extracted from a transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub kind: IntentKind,
    /// Free-text argument: the media query for `PlayMedia`, the original
    /// transcript for `Unknown`.
    pub query: String,
    /// Structured arguments, e.g. "level" for `VolumeSet`.
    pub params: HashMap<String, Value>,
}

impl Intent {
    pub fn new(kind: IntentKind) -> Self {
        Self {
            kind,
            query: String::new(),
            params: HashMap::new(),
        }
    }

    pub fn with_query(kind: IntentKind, query: impl Into<String>) -> Self {
        Self {
            kind,
            query: query.into(),
            params: HashMap::new(),
        }
    }

    /// Unrecognized input, echoing the transcript for diagnostics.
    pub fn unknown(text: impl Into<String>) -> Self {
        Self::with_query(IntentKind::Unknown, text)
    }

    /// The volume level argument, when present and integral.
    pub fn level(&self) -> Option<i64> {
        self.params.get("level").and_then(Value::as_i64)
    }
}
